//! Cart validation and checkout endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use common::{AddressId, FulfillmentMethod, PaymentMethod};
use domain::capability::{self, Action, Resource};
use domain::{CartReport, CheckoutRequest};
use payment::PaymentGateway;
use serde::{Deserialize, Serialize};
use storage::MarketStore;
use uuid::Uuid;

use crate::AppState;
use crate::error::{ApiError, FieldErrors};
use crate::routes::actor;

#[derive(Deserialize)]
pub struct CheckoutBody {
    pub shipping_address_id: Option<Uuid>,
    pub fulfillment_method: String,
    pub payment_method: String,
}

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub group_id: String,
    pub status: String,
    pub total_cents: i64,
    pub orders: Vec<CheckoutOrderResponse>,
}

#[derive(Serialize)]
pub struct CheckoutOrderResponse {
    pub order_id: String,
    pub shop_id: String,
    pub total_cents: i64,
}

/// Parses the request body, aggregating every field problem instead of
/// failing on the first.
fn parse_body(body: &CheckoutBody) -> Result<ParsedCheckout, ApiError> {
    let mut errors = FieldErrors::new();

    let fulfillment_method = match body.fulfillment_method.parse::<FulfillmentMethod>() {
        Ok(method) => Some(method),
        Err(e) => {
            errors.push("fulfillment_method", e.to_string());
            None
        }
    };
    let payment_method = match body.payment_method.parse::<PaymentMethod>() {
        Ok(method) => Some(method),
        Err(e) => {
            errors.push("payment_method", e.to_string());
            None
        }
    };
    if fulfillment_method == Some(FulfillmentMethod::Delivery) && body.shipping_address_id.is_none()
    {
        errors.push(
            "shipping_address_id",
            "a shipping address is required for delivery",
        );
    }
    errors.into_result()?;

    // a field that failed to parse was reported above
    let (Some(fulfillment_method), Some(payment_method)) = (fulfillment_method, payment_method)
    else {
        return Err(ApiError::BadRequest("unparsed request fields".to_string()));
    };

    Ok(ParsedCheckout {
        fulfillment_method,
        payment_method,
        shipping_address_id: body.shipping_address_id.map(AddressId::from_uuid),
    })
}

struct ParsedCheckout {
    fulfillment_method: FulfillmentMethod,
    payment_method: PaymentMethod,
    shipping_address_id: Option<AddressId>,
}

/// GET /cart/validate — advisory availability report for the cart.
#[tracing::instrument(skip(state, headers))]
pub async fn validate_cart<S: MarketStore, G: PaymentGateway>(
    State(state): State<Arc<AppState<S, G>>>,
    headers: HeaderMap,
) -> Result<Json<CartReport>, ApiError> {
    let caller = actor::from_headers(&headers)?;
    let user_id = actor::require_customer(&caller)?;
    if !capability::allowed(&caller, Action::ValidateCart, &Resource::Customer(user_id)) {
        return Err(ApiError::Forbidden("cannot validate this cart".to_string()));
    }

    let report = state.checkout.validate_cart(user_id).await?;
    Ok(Json(report))
}

/// POST /checkout — converts the cart into an order group.
#[tracing::instrument(skip(state, headers, body))]
pub async fn checkout<S: MarketStore, G: PaymentGateway>(
    State(state): State<Arc<AppState<S, G>>>,
    headers: HeaderMap,
    Json(body): Json<CheckoutBody>,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError> {
    let caller = actor::from_headers(&headers)?;
    let user_id = actor::require_customer(&caller)?;
    if !capability::allowed(&caller, Action::Checkout, &Resource::Customer(user_id)) {
        return Err(ApiError::Forbidden("cannot check out this cart".to_string()));
    }

    let parsed = parse_body(&body)?;
    let receipt = state
        .checkout
        .checkout(&CheckoutRequest {
            user_id,
            shipping_address_id: parsed.shipping_address_id,
            fulfillment_method: parsed.fulfillment_method,
            payment_method: parsed.payment_method,
        })
        .await?;

    let response = CheckoutResponse {
        group_id: receipt.group.id.to_string(),
        status: receipt.group.status.to_string(),
        total_cents: receipt.group.total.cents(),
        orders: receipt
            .orders
            .iter()
            .map(|order| CheckoutOrderResponse {
                order_id: order.id.to_string(),
                shop_id: order.shop_id.to_string(),
                total_cents: order.total.cents(),
            })
            .collect(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

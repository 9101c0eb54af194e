//! Order transition and bulk cancellation endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use common::{OrderId, OrderStatus, ShopId};
use domain::TransitionRequest;
use domain::capability::{self, Action, Resource};
use payment::PaymentGateway;
use serde::{Deserialize, Serialize};
use storage::MarketStore;
use uuid::Uuid;

use crate::AppState;
use crate::error::{ApiError, FieldErrors};
use crate::routes::actor;

#[derive(Deserialize)]
pub struct TransitionBody {
    pub target: String,
    pub delivery_date: Option<DateTime<Utc>>,
    /// Confirms a cash order was paid when completing it.
    #[serde(default)]
    pub payment_status: bool,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub group_id: String,
    pub status: String,
    pub is_paid: bool,
    pub is_delivered: bool,
    pub is_picked_up: bool,
    pub delivery_date: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct BulkCancelResponse {
    pub cancelled: usize,
}

/// POST /orders/{id}/transition — moves an order through its lifecycle.
#[tracing::instrument(skip(state, headers, body))]
pub async fn transition<S: MarketStore, G: PaymentGateway>(
    State(state): State<Arc<AppState<S, G>>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<TransitionBody>,
) -> Result<Json<OrderResponse>, ApiError> {
    let caller = actor::from_headers(&headers)?;
    let order_id = OrderId::from_uuid(id);

    let mut errors = FieldErrors::new();
    let target = match body.target.parse::<OrderStatus>() {
        Ok(target) => Some(target),
        Err(e) => {
            errors.push("target", e.to_string());
            None
        }
    };
    errors.into_result()?;
    let Some(target) = target else {
        return Err(ApiError::BadRequest("unparsed target status".to_string()));
    };

    let order = state
        .store
        .get_order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("order {id} not found")))?;
    if !capability::allowed(&caller, Action::TransitionOrder, &Resource::Order(&order)) {
        return Err(ApiError::Forbidden(
            "cannot transition orders of another shop".to_string(),
        ));
    }

    let mut request = TransitionRequest::to(target);
    request.delivery_date = body.delivery_date;
    request.mark_paid = body.payment_status;

    let order = state.orders.transition(order_id, &request).await?;
    Ok(Json(OrderResponse {
        order_id: order.id.to_string(),
        group_id: order.group_id.to_string(),
        status: order.status.to_string(),
        is_paid: order.is_paid,
        is_delivered: order.is_delivered,
        is_picked_up: order.is_picked_up,
        delivery_date: order.delivery_date,
    }))
}

/// POST /shops/{id}/cancel-pending — bulk-cancels a shop's pending
/// orders (shop deactivation path). In-flight orders are untouched.
#[tracing::instrument(skip(state, headers))]
pub async fn cancel_shop_pending<S: MarketStore, G: PaymentGateway>(
    State(state): State<Arc<AppState<S, G>>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<BulkCancelResponse>, ApiError> {
    let caller = actor::from_headers(&headers)?;
    let shop_id = ShopId::from_uuid(id);
    if !capability::allowed(&caller, Action::CancelShopPending, &Resource::Shop(shop_id)) {
        return Err(ApiError::Forbidden(
            "cannot cancel pending orders of another shop".to_string(),
        ));
    }

    let cancelled = state.orders.cancel_pending_for_shop(shop_id).await?;
    Ok(Json(BulkCancelResponse { cancelled }))
}

/// POST /customers/me/cancel-pending — bulk-cancels the caller's own
/// pending orders (account closure path).
#[tracing::instrument(skip(state, headers))]
pub async fn cancel_customer_pending<S: MarketStore, G: PaymentGateway>(
    State(state): State<Arc<AppState<S, G>>>,
    headers: HeaderMap,
) -> Result<Json<BulkCancelResponse>, ApiError> {
    let caller = actor::from_headers(&headers)?;
    let user_id = actor::require_customer(&caller)?;
    if !capability::allowed(
        &caller,
        Action::CancelCustomerPending,
        &Resource::Customer(user_id),
    ) {
        return Err(ApiError::Forbidden(
            "cannot cancel another customer's orders".to_string(),
        ));
    }

    let cancelled = state.orders.cancel_pending_for_customer(user_id).await?;
    Ok(Json(BulkCancelResponse { cancelled }))
}

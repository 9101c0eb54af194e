//! Payment initialization and webhook endpoints.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use common::OrderGroupId;
use domain::capability::{self, Action, Resource};
use payment::{PaymentError, PaymentGateway, webhook};
use serde::{Deserialize, Serialize};
use storage::MarketStore;
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;
use crate::routes::actor;

#[derive(Deserialize)]
pub struct InitializeBody {
    pub group_id: Uuid,
    pub email: String,
}

#[derive(Serialize)]
pub struct InitializeResponse {
    pub reference: String,
    pub authorization_url: String,
}

/// POST /payments/initialize — creates or rotates the gateway payment
/// for a digital group and returns the checkout URL.
#[tracing::instrument(skip(state, headers, body))]
pub async fn initialize<S: MarketStore, G: PaymentGateway>(
    State(state): State<Arc<AppState<S, G>>>,
    headers: HeaderMap,
    Json(body): Json<InitializeBody>,
) -> Result<Json<InitializeResponse>, ApiError> {
    let caller = actor::from_headers(&headers)?;
    let group_id = OrderGroupId::from_uuid(body.group_id);

    let group = state
        .store
        .get_order_group(group_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("order group {group_id} not found")))?;
    if !capability::allowed(&caller, Action::InitializePayment, &Resource::Group(&group)) {
        return Err(ApiError::NotFound(format!(
            "order group {group_id} not found"
        )));
    }

    let init = state.payments.initialize(group_id, &body.email).await?;
    Ok(Json(InitializeResponse {
        reference: init.reference,
        authorization_url: init.authorization_url,
    }))
}

#[derive(Deserialize)]
pub struct VerifyBody {
    pub reference: String,
}

/// POST /payments/verify — polling fallback for a missed webhook.
///
/// The customer lands back on the callback page and asks us to check;
/// we only enqueue the same verification task the webhook would, and
/// the task re-queries the gateway for the authoritative answer.
#[tracing::instrument(skip(state, headers, body))]
pub async fn request_verification<S: MarketStore, G: PaymentGateway>(
    State(state): State<Arc<AppState<S, G>>>,
    headers: HeaderMap,
    Json(body): Json<VerifyBody>,
) -> Result<StatusCode, ApiError> {
    let caller = actor::from_headers(&headers)?;

    let payment = state
        .store
        .get_payment_by_reference(&body.reference)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("payment {} not found", body.reference)))?;
    let group = state
        .store
        .get_order_group(payment.group_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("order group {} not found", payment.group_id)))?;
    if !capability::allowed(&caller, Action::InitializePayment, &Resource::Group(&group)) {
        return Err(ApiError::NotFound(format!(
            "payment {} not found",
            body.reference
        )));
    }

    state.payments.enqueue_verification(&body.reference).await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /payments/webhook — inbound gateway events.
///
/// The signature is verified over the raw body before anything else; an
/// invalid signature is rejected with no side effects. A valid
/// `charge.success` only enqueues verification — financial state changes
/// happen in the background task after re-querying the gateway.
#[tracing::instrument(skip(state, headers, body))]
pub async fn webhook<S: MarketStore, G: PaymentGateway>(
    State(state): State<Arc<AppState<S, G>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let signature = headers
        .get(webhook::SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if !webhook::verify_signature(&state.webhook_secret, &body, signature) {
        metrics::counter!("webhook_rejected_total").increment(1);
        return Err(ApiError::Payment(PaymentError::SignatureInvalid));
    }

    let event: webhook::WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("unparseable webhook body: {e}")))?;

    if event.event == webhook::CHARGE_SUCCESS {
        state
            .payments
            .enqueue_verification(&event.data.reference)
            .await?;
        tracing::info!(reference = %event.data.reference, "charge.success queued for verification");
    } else {
        tracing::debug!(event = %event.event, "ignoring webhook event");
    }

    Ok(StatusCode::OK)
}

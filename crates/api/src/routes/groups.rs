//! Order group endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use common::OrderGroupId;
use domain::capability::{self, Action, Resource};
use payment::PaymentGateway;
use serde::Serialize;
use storage::MarketStore;
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;
use crate::routes::actor;

#[derive(Serialize)]
pub struct GroupResponse {
    pub group_id: String,
    pub status: String,
    pub fulfillment_method: String,
    pub payment_method: String,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub orders: Vec<GroupOrderResponse>,
}

#[derive(Serialize)]
pub struct GroupOrderResponse {
    pub order_id: String,
    pub shop_id: String,
    pub status: String,
    pub total_cents: i64,
}

/// GET /order-groups/{id} — loads a group with its orders.
#[tracing::instrument(skip(state, headers))]
pub async fn get<S: MarketStore, G: PaymentGateway>(
    State(state): State<Arc<AppState<S, G>>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<GroupResponse>, ApiError> {
    let caller = actor::from_headers(&headers)?;
    let group_id = OrderGroupId::from_uuid(id);

    let group = state
        .store
        .get_order_group(group_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("order group {id} not found")))?;
    // reuse the cancel capability: the set of people who may see a group
    // is the set of people who own it
    if !capability::allowed(&caller, Action::CancelGroup, &Resource::Group(&group)) {
        return Err(ApiError::NotFound(format!("order group {id} not found")));
    }

    let orders = state.store.orders_in_group(group_id).await?;
    Ok(Json(GroupResponse {
        group_id: group.id.to_string(),
        status: group.status.to_string(),
        fulfillment_method: group.fulfillment_method.to_string(),
        payment_method: group.payment_method.to_string(),
        total_cents: group.total.cents(),
        created_at: group.created_at,
        cancelled_at: group.cancelled_at,
        orders: orders
            .iter()
            .map(|order| GroupOrderResponse {
                order_id: order.id.to_string(),
                shop_id: order.shop_id.to_string(),
                status: order.status.to_string(),
                total_cents: order.total.cents(),
            })
            .collect(),
    }))
}

/// POST /order-groups/{id}/cancel — customer cancellation, only while
/// the group is pending and inside the cancellation window.
#[tracing::instrument(skip(state, headers))]
pub async fn cancel<S: MarketStore, G: PaymentGateway>(
    State(state): State<Arc<AppState<S, G>>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<GroupResponse>, ApiError> {
    let caller = actor::from_headers(&headers)?;
    let user_id = actor::require_customer(&caller)?;
    let group_id = OrderGroupId::from_uuid(id);

    let group = state
        .store
        .get_order_group(group_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("order group {id} not found")))?;
    if !capability::allowed(&caller, Action::CancelGroup, &Resource::Group(&group)) {
        return Err(ApiError::NotFound(format!("order group {id} not found")));
    }

    let group = state
        .orders
        .cancel_group_as_customer(user_id, group_id)
        .await?;
    let orders = state.store.orders_in_group(group_id).await?;
    Ok(Json(GroupResponse {
        group_id: group.id.to_string(),
        status: group.status.to_string(),
        fulfillment_method: group.fulfillment_method.to_string(),
        payment_method: group.payment_method.to_string(),
        total_cents: group.total.cents(),
        created_at: group.created_at,
        cancelled_at: group.cancelled_at,
        orders: orders
            .iter()
            .map(|order| GroupOrderResponse {
                order_id: order.id.to_string(),
                shop_id: order.shop_id.to_string(),
                status: order.status.to_string(),
                total_cents: order.total.cents(),
            })
            .collect(),
    }))
}

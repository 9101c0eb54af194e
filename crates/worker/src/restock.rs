//! Inventory restock compensation for cancelled orders.

use chrono::Utc;
use common::{OrderId, OrderStatus};
use domain::ledger;
use storage::{MarketStore, StoreTx};

use crate::error::WorkerError;

/// What a restock pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestockOutcome {
    /// Stock was re-credited and the order stamped.
    Restocked,
    /// A previous pass already ran; nothing was mutated.
    AlreadyRestocked,
    /// The order is gone or not cancelled; nothing to compensate.
    Skipped,
}

/// Re-credits stock for every item of a cancelled order.
///
/// Safe to re-run: the order's `restocked_at` stamp is checked under the
/// order lock, so a retried task after a crash cannot double-credit.
/// Items whose product has since been deleted are skipped silently.
#[tracing::instrument(skip(store))]
pub async fn restock_order<S: MarketStore>(
    store: &S,
    order_id: OrderId,
) -> Result<RestockOutcome, WorkerError> {
    let now = Utc::now();
    let mut tx = store.begin().await?;

    let Some(mut order) = tx.lock_order(order_id).await? else {
        tracing::warn!(%order_id, "restock requested for unknown order");
        return Ok(RestockOutcome::Skipped);
    };
    if order.status != OrderStatus::Cancelled {
        tracing::warn!(%order_id, status = %order.status, "restock requested for live order");
        return Ok(RestockOutcome::Skipped);
    }
    if order.restocked_at.is_some() {
        return Ok(RestockOutcome::AlreadyRestocked);
    }

    let mut items = tx.order_items(order_id).await?;
    items.sort_by_key(|item| item.product_id);

    for item in items {
        // product deleted since the order was placed: nothing to credit
        if tx.lock_stock(item.product_id).await?.is_none() {
            tracing::debug!(product_id = %item.product_id, "skipping restock of deleted product");
            continue;
        }
        ledger::add(&mut tx, item.product_id, item.quantity, ledger::RESTOCK_ACTOR).await?;
    }

    order.restocked_at = Some(now);
    tx.update_order(&order).await?;
    tx.commit().await?;

    metrics::counter!("restocks_total").increment(1);
    tracing::info!(%order_id, "order restocked");
    Ok(RestockOutcome::Restocked)
}

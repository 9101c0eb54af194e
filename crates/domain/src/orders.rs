//! Order lifecycle execution: locking transitions, group aggregation and
//! the cancellation operations.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use common::{
    FulfillmentMethod, GroupStatus, OrderGroupId, OrderId, OrderStatus, PaymentMethod, ShopId,
    UserId,
};
use storage::{MarketStore, OrderGroupRecord, OrderRecord, StoreTx, TaskPayload};

use crate::cancellation_window;
use crate::error::DomainError;
use crate::rules::{self, TransitionRequest};

/// Drives order status transitions and cancellations.
///
/// Every operation re-reads and locks the rows it touches (order first,
/// then its group, always in that sequence) and re-validates the rules
/// under the lock, so a check that passed before lock acquisition cannot
/// be invalidated by a concurrent writer.
#[derive(Clone)]
pub struct OrderService<S: MarketStore> {
    store: S,
}

impl<S: MarketStore> OrderService<S> {
    /// Creates a new order service.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Transitions one order to a new status.
    ///
    /// On success the group's aggregate status is recomputed in the same
    /// transaction. A transition to cancelled enqueues a restock task
    /// that runs only after the transaction commits.
    #[tracing::instrument(skip(self, request), fields(target = %request.target))]
    pub async fn transition(
        &self,
        order_id: OrderId,
        request: &TransitionRequest,
    ) -> Result<OrderRecord, DomainError> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;

        let mut order = tx
            .lock_order(order_id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "order",
                id: order_id.to_string(),
            })?;
        let mut group =
            tx.lock_order_group(order.group_id)
                .await?
                .ok_or_else(|| DomainError::NotFound {
                    entity: "order group",
                    id: order.group_id.to_string(),
                })?;

        rules::check_transition(&order, &group, request, now)?;
        apply_transition(&mut order, &group, request, now);
        tx.update_order(&order).await?;

        if request.target == OrderStatus::Cancelled {
            tx.enqueue_task(&TaskPayload::Restock { order_id }, now).await?;
        }

        let siblings = tx.lock_orders_in_group(group.id).await?;
        if let Some(next) = aggregate_status(&siblings, group.status) {
            group.status = next;
            if next == GroupStatus::Cancelled {
                group.cancelled_at = Some(now);
            }
            tx.update_order_group(&group).await?;
        }

        tx.commit().await?;
        metrics::counter!("order_transitions_total", "target" => request.target.as_str())
            .increment(1);
        tracing::info!(%order_id, status = %order.status, "order transitioned");

        Ok(order)
    }

    /// Cancels a pending group on the customer's request.
    ///
    /// Only permitted while the group is pending and within the
    /// cancellation window of its creation. Flags a refund request if a
    /// verified digital payment exists, and schedules restock per order.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_group_as_customer(
        &self,
        user_id: UserId,
        group_id: OrderGroupId,
    ) -> Result<OrderGroupRecord, DomainError> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;

        let group = tx
            .lock_order_group(group_id)
            .await?
            .filter(|g| g.user_id == user_id)
            .ok_or_else(|| DomainError::NotFound {
                entity: "order group",
                id: group_id.to_string(),
            })?;

        if group.status != GroupStatus::Pending {
            return Err(DomainError::GroupNotCancellable {
                status: group.status,
            });
        }
        if now - group.created_at > cancellation_window() {
            return Err(DomainError::CancellationWindowExpired);
        }

        let group = cancel_group_locked(&mut tx, group, now).await?;
        tx.commit().await?;

        metrics::counter!("group_cancellations_total", "source" => "customer").increment(1);
        Ok(group)
    }

    /// Cancels a stale unpaid digital group found by the scheduler scan.
    ///
    /// All scan conditions are re-checked under the lock; returns false
    /// when the group no longer qualifies (paid or progressed meanwhile).
    #[tracing::instrument(skip(self))]
    pub async fn cancel_stale_group(
        &self,
        group_id: OrderGroupId,
        cutoff: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;

        let Some(group) = tx.lock_order_group(group_id).await? else {
            return Ok(false);
        };
        if group.status != GroupStatus::Pending
            || group.payment_method != PaymentMethod::Digital
            || group.created_at >= cutoff
        {
            return Ok(false);
        }
        if let Some(payment) = tx.lock_payment_for_group(group_id).await?
            && payment.verified
        {
            return Ok(false);
        }

        cancel_group_locked(&mut tx, group, now).await?;
        tx.commit().await?;

        metrics::counter!("group_cancellations_total", "source" => "stale_scan").increment(1);
        Ok(true)
    }

    /// Cancels every pending order across a customer's groups.
    ///
    /// In-flight orders (processing and beyond) are left untouched: bulk
    /// operations never force-cancel active fulfillment.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_pending_for_customer(
        &self,
        user_id: UserId,
    ) -> Result<usize, DomainError> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let orders = tx.lock_pending_orders_for_user(user_id).await?;
        let cancelled = bulk_cancel_locked(&mut tx, orders, now).await?;
        tx.commit().await?;

        metrics::counter!("bulk_cancellations_total", "scope" => "customer")
            .increment(cancelled as u64);
        Ok(cancelled)
    }

    /// Cancels every pending order of a shop, used when the shop is
    /// deactivated. Orders already processing are left untouched.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_pending_for_shop(&self, shop_id: ShopId) -> Result<usize, DomainError> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let orders = tx.lock_pending_orders_for_shop(shop_id).await?;
        let cancelled = bulk_cancel_locked(&mut tx, orders, now).await?;
        tx.commit().await?;

        metrics::counter!("bulk_cancellations_total", "scope" => "shop")
            .increment(cancelled as u64);
        Ok(cancelled)
    }
}

fn apply_transition(
    order: &mut OrderRecord,
    group: &OrderGroupRecord,
    request: &TransitionRequest,
    now: DateTime<Utc>,
) {
    order.status = request.target;
    match request.target {
        OrderStatus::Pending => {}
        OrderStatus::Processing => order.processing_at = Some(now),
        OrderStatus::Shipped => {
            order.shipped_at = Some(now);
            order.delivery_date = request.delivery_date;
        }
        OrderStatus::Completed => {
            order.completed_at = Some(now);
            match group.fulfillment_method {
                FulfillmentMethod::Pickup => order.is_picked_up = true,
                FulfillmentMethod::Delivery => order.is_delivered = true,
            }
            if group.payment_method == PaymentMethod::Cash && !order.is_paid && request.mark_paid {
                order.is_paid = true;
                order.paid_at = Some(now);
            }
        }
        OrderStatus::Cancelled => order.cancelled_at = Some(now),
    }
}

/// Derives the group status from its orders. Returns `None` when the
/// aggregate should not change, which keeps an already-fulfilled group
/// from being rewritten on a retried read.
fn aggregate_status(orders: &[OrderRecord], current: GroupStatus) -> Option<GroupStatus> {
    if orders.is_empty() {
        return None;
    }

    let next = if orders.iter().all(|o| o.status == OrderStatus::Completed) {
        GroupStatus::Fulfilled
    } else if orders.iter().all(|o| o.status == OrderStatus::Cancelled) {
        GroupStatus::Cancelled
    } else if orders.iter().any(|o| o.status.is_terminal()) {
        GroupStatus::PartiallyFulfilled
    } else {
        return None;
    };

    (next != current).then_some(next)
}

/// Cancels an already-locked group and all its live orders, flags a
/// refund for a verified digital payment, and enqueues one restock task
/// per cancelled order.
async fn cancel_group_locked<T: StoreTx>(
    tx: &mut T,
    mut group: OrderGroupRecord,
    now: DateTime<Utc>,
) -> Result<OrderGroupRecord, DomainError> {
    let orders = tx.lock_orders_in_group(group.id).await?;
    for mut order in orders {
        if order.status.is_terminal() {
            continue;
        }
        order.status = OrderStatus::Cancelled;
        order.cancelled_at = Some(now);
        tx.update_order(&order).await?;
        tx.enqueue_task(&TaskPayload::Restock { order_id: order.id }, now)
            .await?;
    }

    group.status = GroupStatus::Cancelled;
    group.cancelled_at = Some(now);
    tx.update_order_group(&group).await?;

    if group.payment_method == PaymentMethod::Digital
        && let Some(mut payment) = tx.lock_payment_for_group(group.id).await?
        && payment.verified
        && !payment.refund_requested
    {
        payment.refund_requested = true;
        tx.update_payment(&payment).await?;
        tracing::info!(group_id = %group.id, "refund requested for cancelled paid group");
    }

    Ok(group)
}

/// Flips a batch of already-locked pending orders to cancelled and
/// recomputes the aggregate of each touched group.
async fn bulk_cancel_locked<T: StoreTx>(
    tx: &mut T,
    orders: Vec<OrderRecord>,
    now: DateTime<Utc>,
) -> Result<usize, DomainError> {
    let mut touched: BTreeSet<OrderGroupId> = BTreeSet::new();
    let mut cancelled = 0;

    for mut order in orders {
        debug_assert_eq!(order.status, OrderStatus::Pending);
        order.status = OrderStatus::Cancelled;
        order.cancelled_at = Some(now);
        tx.update_order(&order).await?;
        tx.enqueue_task(&TaskPayload::Restock { order_id: order.id }, now)
            .await?;
        touched.insert(order.group_id);
        cancelled += 1;
    }

    for group_id in touched {
        let Some(mut group) = tx.lock_order_group(group_id).await? else {
            continue;
        };
        let siblings = tx.lock_orders_in_group(group_id).await?;
        if let Some(next) = aggregate_status(&siblings, group.status) {
            group.status = next;
            if next == GroupStatus::Cancelled {
                group.cancelled_at = Some(now);
            }
            tx.update_order_group(&group).await?;
        }
    }

    Ok(cancelled)
}

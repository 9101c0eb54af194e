//! The storage traits the transactional core is written against.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AddressId, OrderGroupId, OrderId, ProductId, ShopId, UserId};

use crate::error::Result;
use crate::outbox::{OutboxTask, TaskPayload};
use crate::records::{
    AddressRecord, CartItemRecord, OrderGroupRecord, OrderItemRecord, OrderRecord, PaymentRecord,
    ProductRecord, StockRecord,
};

/// Handle to the marketplace database.
///
/// All state-changing work happens inside a [`StoreTx`] obtained from
/// [`begin`](MarketStore::begin); the methods on the store itself are
/// lock-free reads for background jobs and read endpoints, plus the outbox
/// claim/complete bookkeeping used by the dispatcher.
#[async_trait]
pub trait MarketStore: Clone + Send + Sync + 'static {
    /// The transaction type produced by this store.
    type Tx: StoreTx;

    /// Opens a new transaction.
    async fn begin(&self) -> Result<Self::Tx>;

    /// Loads an order without locking it.
    async fn get_order(&self, id: OrderId) -> Result<Option<OrderRecord>>;

    /// Loads an order group without locking it.
    async fn get_order_group(&self, id: OrderGroupId) -> Result<Option<OrderGroupRecord>>;

    /// Loads every order belonging to a group.
    async fn orders_in_group(&self, group_id: OrderGroupId) -> Result<Vec<OrderRecord>>;

    /// Finds a payment by its gateway reference.
    async fn get_payment_by_reference(&self, reference: &str) -> Result<Option<PaymentRecord>>;

    /// Lists pending digital groups created before `cutoff` whose payment
    /// has not been verified — the candidates for auto-cancellation.
    async fn stale_unpaid_digital_groups(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<OrderGroupId>>;

    /// Claims up to `limit` due pending outbox tasks, incrementing each
    /// task's attempt counter. A claimed task stays pending until the
    /// dispatcher completes, reschedules or buries it.
    async fn claim_due_tasks(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<OutboxTask>>;

    /// Marks an outbox task as done.
    async fn complete_task(&self, id: i64) -> Result<()>;

    /// Pushes an outbox task's next attempt into the future after a
    /// transient failure.
    async fn reschedule_task(
        &self,
        id: i64,
        next_attempt_at: DateTime<Utc>,
        error: &str,
    ) -> Result<()>;

    /// Marks an outbox task as permanently failed.
    async fn bury_task(&self, id: i64, error: &str) -> Result<()>;
}

/// One database transaction.
///
/// `lock_*` methods take a row-level exclusive lock that is held until the
/// transaction commits or rolls back. Dropping the transaction without
/// calling [`commit`](StoreTx::commit) discards every staged mutation.
#[async_trait]
pub trait StoreTx: Send {
    /// Loads a product from the directory.
    async fn get_product(&mut self, id: ProductId) -> Result<Option<ProductRecord>>;

    /// Locks and returns the stock row for a product.
    async fn lock_stock(&mut self, product_id: ProductId) -> Result<Option<StockRecord>>;

    /// Writes back a stock row previously locked in this transaction.
    async fn update_stock(&mut self, record: &StockRecord) -> Result<()>;

    /// Loads the customer's cart lines.
    async fn cart_items(&mut self, user_id: UserId) -> Result<Vec<CartItemRecord>>;

    /// Deletes every cart line for the customer.
    async fn delete_cart_items(&mut self, user_id: UserId) -> Result<()>;

    /// Resolves a shipping address, scoped to its owner.
    async fn get_address(
        &mut self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Option<AddressRecord>>;

    /// Inserts a new order group.
    async fn insert_order_group(&mut self, group: &OrderGroupRecord) -> Result<()>;

    /// Inserts a new order.
    async fn insert_order(&mut self, order: &OrderRecord) -> Result<()>;

    /// Inserts a new order item snapshot.
    async fn insert_order_item(&mut self, item: &OrderItemRecord) -> Result<()>;

    /// Locks and returns an order.
    async fn lock_order(&mut self, id: OrderId) -> Result<Option<OrderRecord>>;

    /// Locks and returns an order group.
    async fn lock_order_group(&mut self, id: OrderGroupId) -> Result<Option<OrderGroupRecord>>;

    /// Locks and returns every order in a group, ordered by id.
    async fn lock_orders_in_group(&mut self, group_id: OrderGroupId) -> Result<Vec<OrderRecord>>;

    /// Locks and returns every pending order belonging to the customer's
    /// groups, ordered by id.
    async fn lock_pending_orders_for_user(&mut self, user_id: UserId) -> Result<Vec<OrderRecord>>;

    /// Locks and returns every pending order for a shop, ordered by id.
    async fn lock_pending_orders_for_shop(&mut self, shop_id: ShopId) -> Result<Vec<OrderRecord>>;

    /// Writes back an order previously locked in this transaction.
    async fn update_order(&mut self, order: &OrderRecord) -> Result<()>;

    /// Writes back an order group previously locked in this transaction.
    async fn update_order_group(&mut self, group: &OrderGroupRecord) -> Result<()>;

    /// Loads the item snapshots of an order.
    async fn order_items(&mut self, order_id: OrderId) -> Result<Vec<OrderItemRecord>>;

    /// Locks and returns the payment of a group, if any.
    async fn lock_payment_for_group(
        &mut self,
        group_id: OrderGroupId,
    ) -> Result<Option<PaymentRecord>>;

    /// Locks and returns a payment by gateway reference, if any.
    async fn lock_payment_by_reference(
        &mut self,
        reference: &str,
    ) -> Result<Option<PaymentRecord>>;

    /// Inserts a new payment.
    async fn insert_payment(&mut self, payment: &PaymentRecord) -> Result<()>;

    /// Writes back a payment previously locked in this transaction.
    async fn update_payment(&mut self, payment: &PaymentRecord) -> Result<()>;

    /// Enqueues a background task in the transactional outbox, runnable
    /// from `run_at` onwards.
    async fn enqueue_task(&mut self, payload: &TaskPayload, run_at: DateTime<Utc>) -> Result<()>;

    /// Commits the transaction, making all staged mutations and enqueued
    /// tasks visible.
    async fn commit(self) -> Result<()>;
}

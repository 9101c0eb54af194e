//! In-memory store implementation for testing.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AddressId, OrderGroupId, OrderId, PaymentMethod, ProductId, ShopId, UserId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::Result;
use crate::outbox::{OutboxStatus, OutboxTask, TaskPayload};
use crate::records::{
    AddressRecord, CartItemRecord, OrderGroupRecord, OrderItemRecord, OrderRecord, PaymentRecord,
    ProductRecord, StockRecord,
};
use crate::store::{MarketStore, StoreTx};

#[derive(Debug, Clone, Default)]
struct MemState {
    products: HashMap<ProductId, ProductRecord>,
    stock: HashMap<ProductId, StockRecord>,
    cart_items: BTreeMap<(UserId, ProductId), CartItemRecord>,
    addresses: HashMap<AddressId, AddressRecord>,
    groups: HashMap<OrderGroupId, OrderGroupRecord>,
    orders: BTreeMap<OrderId, OrderRecord>,
    order_items: Vec<OrderItemRecord>,
    payments: HashMap<OrderGroupId, PaymentRecord>,
    outbox: Vec<OutboxTask>,
    next_task_id: i64,
}

/// In-memory [`MarketStore`] with the same transactional semantics as the
/// PostgreSQL implementation.
///
/// A transaction holds the store's single mutex for its whole lifetime, so
/// concurrent transactions serialize exactly like contended row locks do.
/// Mutations are staged against a copy of the state and only become
/// visible on [`commit`](StoreTx::commit); a dropped transaction rolls
/// back by discarding the copy.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemState>>,
}

impl MemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a product together with its stock row.
    ///
    /// Mirrors the production factory step: a product never exists without
    /// its ledger row.
    pub async fn add_product(&self, product: ProductRecord, stock: i64) {
        let mut state = self.state.lock().await;
        state.stock.insert(
            product.id,
            StockRecord {
                product_id: product.id,
                stock,
                last_updated_by: "system:seed".to_string(),
                updated_at: Utc::now(),
            },
        );
        state.products.insert(product.id, product);
    }

    /// Deletes a product and cascades to its stock row, as the directory
    /// service would. Historical order items keep their snapshots.
    pub async fn remove_product(&self, product_id: ProductId) {
        let mut state = self.state.lock().await;
        state.products.remove(&product_id);
        state.stock.remove(&product_id);
    }

    /// Overwrites the stock level of a product.
    pub async fn set_stock(&self, product_id: ProductId, stock: i64) {
        let mut state = self.state.lock().await;
        if let Some(record) = state.stock.get_mut(&product_id) {
            record.stock = stock;
            record.updated_at = Utc::now();
        }
    }

    /// Returns the current stock level of a product.
    pub async fn stock_of(&self, product_id: ProductId) -> Option<i64> {
        self.state
            .lock()
            .await
            .stock
            .get(&product_id)
            .map(|s| s.stock)
    }

    /// Puts a line in a customer's cart, replacing any existing line for
    /// the same product. Quantity zero removes the line.
    pub async fn upsert_cart_item(&self, user_id: UserId, product_id: ProductId, quantity: u32) {
        let mut state = self.state.lock().await;
        if quantity == 0 {
            state.cart_items.remove(&(user_id, product_id));
        } else {
            state.cart_items.insert(
                (user_id, product_id),
                CartItemRecord {
                    user_id,
                    product_id,
                    quantity,
                },
            );
        }
    }

    /// Seeds a shipping address.
    pub async fn add_address(&self, address: AddressRecord) {
        let mut state = self.state.lock().await;
        state.addresses.insert(address.id, address);
    }

    /// Backdates a group's creation time, for exercising the cancellation
    /// window and the stale-order scan.
    pub async fn set_group_created_at(&self, group_id: OrderGroupId, created_at: DateTime<Utc>) {
        let mut state = self.state.lock().await;
        if let Some(group) = state.groups.get_mut(&group_id) {
            group.created_at = created_at;
        }
    }

    /// Returns a snapshot of every outbox row.
    pub async fn outbox_snapshot(&self) -> Vec<OutboxTask> {
        self.state.lock().await.outbox.clone()
    }

    /// Returns the total number of order groups.
    pub async fn group_count(&self) -> usize {
        self.state.lock().await.groups.len()
    }

    /// Returns the total number of orders.
    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    /// Returns the number of cart lines a customer has.
    pub async fn cart_len(&self, user_id: UserId) -> usize {
        self.state
            .lock()
            .await
            .cart_items
            .keys()
            .filter(|(u, _)| *u == user_id)
            .count()
    }
}

#[async_trait]
impl MarketStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(MemoryTx { guard, staged })
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<OrderRecord>> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn get_order_group(&self, id: OrderGroupId) -> Result<Option<OrderGroupRecord>> {
        Ok(self.state.lock().await.groups.get(&id).cloned())
    }

    async fn orders_in_group(&self, group_id: OrderGroupId) -> Result<Vec<OrderRecord>> {
        Ok(self
            .state
            .lock()
            .await
            .orders
            .values()
            .filter(|o| o.group_id == group_id)
            .cloned()
            .collect())
    }

    async fn get_payment_by_reference(&self, reference: &str) -> Result<Option<PaymentRecord>> {
        Ok(self
            .state
            .lock()
            .await
            .payments
            .values()
            .find(|p| p.reference == reference)
            .cloned())
    }

    async fn stale_unpaid_digital_groups(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<OrderGroupId>> {
        let state = self.state.lock().await;
        let mut ids: Vec<OrderGroupId> = state
            .groups
            .values()
            .filter(|g| {
                g.status == common::GroupStatus::Pending
                    && g.payment_method == PaymentMethod::Digital
                    && g.created_at < cutoff
                    && !state.payments.get(&g.id).is_some_and(|p| p.verified)
            })
            .map(|g| g.id)
            .collect();
        ids.sort();
        ids.truncate(limit as usize);
        Ok(ids)
    }

    async fn claim_due_tasks(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<OutboxTask>> {
        let mut state = self.state.lock().await;
        let mut claimed = Vec::new();
        for task in state.outbox.iter_mut() {
            if claimed.len() as i64 >= limit {
                break;
            }
            if task.status == OutboxStatus::Pending && task.next_attempt_at <= now {
                task.attempts += 1;
                claimed.push(task.clone());
            }
        }
        Ok(claimed)
    }

    async fn complete_task(&self, id: i64) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(task) = state.outbox.iter_mut().find(|t| t.id == id) {
            task.status = OutboxStatus::Done;
        }
        Ok(())
    }

    async fn reschedule_task(
        &self,
        id: i64,
        next_attempt_at: DateTime<Utc>,
        error: &str,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(task) = state.outbox.iter_mut().find(|t| t.id == id) {
            task.next_attempt_at = next_attempt_at;
            task.last_error = Some(error.to_string());
        }
        Ok(())
    }

    async fn bury_task(&self, id: i64, error: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(task) = state.outbox.iter_mut().find(|t| t.id == id) {
            task.status = OutboxStatus::Dead;
            task.last_error = Some(error.to_string());
        }
        Ok(())
    }
}

/// A transaction over the in-memory store.
pub struct MemoryTx {
    guard: OwnedMutexGuard<MemState>,
    staged: MemState,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn get_product(&mut self, id: ProductId) -> Result<Option<ProductRecord>> {
        Ok(self.staged.products.get(&id).cloned())
    }

    async fn lock_stock(&mut self, product_id: ProductId) -> Result<Option<StockRecord>> {
        Ok(self.staged.stock.get(&product_id).cloned())
    }

    async fn update_stock(&mut self, record: &StockRecord) -> Result<()> {
        self.staged.stock.insert(record.product_id, record.clone());
        Ok(())
    }

    async fn cart_items(&mut self, user_id: UserId) -> Result<Vec<CartItemRecord>> {
        Ok(self
            .staged
            .cart_items
            .iter()
            .filter(|((u, _), _)| *u == user_id)
            .map(|(_, item)| item.clone())
            .collect())
    }

    async fn delete_cart_items(&mut self, user_id: UserId) -> Result<()> {
        self.staged.cart_items.retain(|(u, _), _| *u != user_id);
        Ok(())
    }

    async fn get_address(
        &mut self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Option<AddressRecord>> {
        Ok(self
            .staged
            .addresses
            .get(&id)
            .filter(|a| a.user_id == user_id)
            .cloned())
    }

    async fn insert_order_group(&mut self, group: &OrderGroupRecord) -> Result<()> {
        self.staged.groups.insert(group.id, group.clone());
        Ok(())
    }

    async fn insert_order(&mut self, order: &OrderRecord) -> Result<()> {
        self.staged.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn insert_order_item(&mut self, item: &OrderItemRecord) -> Result<()> {
        self.staged.order_items.push(item.clone());
        Ok(())
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<OrderRecord>> {
        Ok(self.staged.orders.get(&id).cloned())
    }

    async fn lock_order_group(&mut self, id: OrderGroupId) -> Result<Option<OrderGroupRecord>> {
        Ok(self.staged.groups.get(&id).cloned())
    }

    async fn lock_orders_in_group(&mut self, group_id: OrderGroupId) -> Result<Vec<OrderRecord>> {
        Ok(self
            .staged
            .orders
            .values()
            .filter(|o| o.group_id == group_id)
            .cloned()
            .collect())
    }

    async fn lock_pending_orders_for_user(&mut self, user_id: UserId) -> Result<Vec<OrderRecord>> {
        let groups = &self.staged.groups;
        Ok(self
            .staged
            .orders
            .values()
            .filter(|o| {
                o.status == common::OrderStatus::Pending
                    && groups.get(&o.group_id).is_some_and(|g| g.user_id == user_id)
            })
            .cloned()
            .collect())
    }

    async fn lock_pending_orders_for_shop(&mut self, shop_id: ShopId) -> Result<Vec<OrderRecord>> {
        Ok(self
            .staged
            .orders
            .values()
            .filter(|o| o.status == common::OrderStatus::Pending && o.shop_id == shop_id)
            .cloned()
            .collect())
    }

    async fn update_order(&mut self, order: &OrderRecord) -> Result<()> {
        self.staged.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn update_order_group(&mut self, group: &OrderGroupRecord) -> Result<()> {
        self.staged.groups.insert(group.id, group.clone());
        Ok(())
    }

    async fn order_items(&mut self, order_id: OrderId) -> Result<Vec<OrderItemRecord>> {
        Ok(self
            .staged
            .order_items
            .iter()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn lock_payment_for_group(
        &mut self,
        group_id: OrderGroupId,
    ) -> Result<Option<PaymentRecord>> {
        Ok(self.staged.payments.get(&group_id).cloned())
    }

    async fn lock_payment_by_reference(
        &mut self,
        reference: &str,
    ) -> Result<Option<PaymentRecord>> {
        Ok(self
            .staged
            .payments
            .values()
            .find(|p| p.reference == reference)
            .cloned())
    }

    async fn insert_payment(&mut self, payment: &PaymentRecord) -> Result<()> {
        self.staged.payments.insert(payment.group_id, payment.clone());
        Ok(())
    }

    async fn update_payment(&mut self, payment: &PaymentRecord) -> Result<()> {
        self.staged.payments.insert(payment.group_id, payment.clone());
        Ok(())
    }

    async fn enqueue_task(&mut self, payload: &TaskPayload, run_at: DateTime<Utc>) -> Result<()> {
        self.staged.next_task_id += 1;
        let task = OutboxTask {
            id: self.staged.next_task_id,
            payload: payload.clone(),
            attempts: 0,
            status: OutboxStatus::Pending,
            next_attempt_at: run_at,
            last_error: None,
            created_at: Utc::now(),
        };
        self.staged.outbox.push(task);
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        let MemoryTx { mut guard, staged } = self;
        *guard = staged;
        Ok(())
    }
}

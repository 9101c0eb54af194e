//! Checkout orchestration: cart to order group, atomically.

use std::collections::BTreeMap;

use chrono::Utc;
use common::{
    AddressId, FulfillmentMethod, GroupStatus, Money, OrderGroupId, OrderId, OrderStatus,
    PaymentMethod, ShopId, UserId,
};
use storage::{
    AddressSnapshot, MarketStore, OrderGroupRecord, OrderItemRecord, OrderRecord, ProductRecord,
    StoreTx,
};
use uuid::Uuid;

use crate::cart::{self, CartReport};
use crate::error::DomainError;
use crate::ledger;

/// Flat delivery fee added to the group total for delivery checkouts.
///
/// Fee computation is deliberately a single constant behind this service;
/// a distance- or weight-based schedule would slot in here.
pub const DEFAULT_DELIVERY_FEE: Money = Money::from_cents(300_000);

/// A checkout request, already authenticated and shape-validated upstream.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub user_id: UserId,
    /// Required for delivery; ignored for pickup.
    pub shipping_address_id: Option<AddressId>,
    pub fulfillment_method: FulfillmentMethod,
    pub payment_method: PaymentMethod,
}

/// The result of a successful checkout.
#[derive(Debug, Clone)]
pub struct CheckoutReceipt {
    pub group: OrderGroupRecord,
    pub orders: Vec<OrderRecord>,
}

/// A cart line joined to its (active) product, priced for order creation.
struct PricedLine {
    product: ProductRecord,
    quantity: u32,
}

/// Converts a customer's cart into one order group with one order per
/// shop, decrementing stock exactly once per line item.
#[derive(Clone)]
pub struct CheckoutService<S: MarketStore> {
    store: S,
    delivery_fee: Money,
}

impl<S: MarketStore> CheckoutService<S> {
    /// Creates a checkout service with the default delivery fee.
    pub fn new(store: S) -> Self {
        Self::with_delivery_fee(store, DEFAULT_DELIVERY_FEE)
    }

    /// Creates a checkout service with a custom flat delivery fee.
    pub fn with_delivery_fee(store: S, delivery_fee: Money) -> Self {
        Self {
            store,
            delivery_fee,
        }
    }

    /// Validates the customer's cart without placing an order.
    ///
    /// The read is advisory, for cart review: the checkout itself
    /// re-verifies under its own locks, and that check is the
    /// authoritative one.
    #[tracing::instrument(skip(self))]
    pub async fn validate_cart(&self, user_id: UserId) -> Result<CartReport, DomainError> {
        let mut tx = self.store.begin().await?;
        let items = tx.cart_items(user_id).await?;
        if items.is_empty() {
            return Err(DomainError::EmptyCart);
        }
        let (_, report) = cart::validate(&mut tx, &items).await?;
        // advisory read set; roll back by dropping the transaction
        Ok(report)
    }

    /// Runs a checkout in one transaction.
    ///
    /// Stock rows are locked in ascending product id order so two
    /// checkouts sharing products cannot deadlock. The quantity check
    /// happens under those locks — any earlier advisory validation is
    /// superseded here — and a failed line aborts the whole transaction:
    /// no orders, no items, no stock changes, and the cart untouched.
    #[tracing::instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutReceipt, DomainError> {
        metrics::counter!("checkout_attempts_total").increment(1);
        let now = Utc::now();
        let mut tx = self.store.begin().await?;

        let shipping_address = self.resolve_shipping(&mut tx, request).await?;

        let items = tx.cart_items(request.user_id).await?;
        if items.is_empty() {
            return Err(DomainError::EmptyCart);
        }

        let mut sorted = items.clone();
        sorted.sort_by_key(|item| item.product_id);

        // Join every line to an active product first; a vanished or
        // deactivated product can never become orderable, so surface the
        // full per-line report for it.
        let mut lines = Vec::with_capacity(sorted.len());
        for item in &sorted {
            match tx.get_product(item.product_id).await? {
                Some(product) if product.active => lines.push(PricedLine {
                    product,
                    quantity: item.quantity,
                }),
                _ => {
                    metrics::counter!("checkout_rejections_total").increment(1);
                    let (_, report) = cart::validate(&mut tx, &items).await?;
                    return Err(DomainError::InvalidCart { report });
                }
            }
        }

        // Authoritative stock pass: rows lock in ascending product id
        // order and each line decrements exactly once. A short line fails
        // the whole transaction with the stock observed under the lock.
        let actor = format!("user:{}", request.user_id.as_uuid());
        for line in &lines {
            ledger::subtract(&mut tx, line.product.id, line.quantity, &actor).await?;
        }

        let group_id = OrderGroupId::new();
        let mut by_shop: BTreeMap<ShopId, Vec<&PricedLine>> = BTreeMap::new();
        for line in &lines {
            by_shop.entry(line.product.shop_id).or_default().push(line);
        }

        let mut orders = Vec::with_capacity(by_shop.len());
        let mut order_items = Vec::with_capacity(lines.len());
        let mut group_total = Money::zero();

        for (shop_id, shop_lines) in by_shop {
            let order_id = OrderId::new();
            let mut order_total = Money::zero();

            for line in shop_lines {
                order_total = order_total.add(line.product.price.multiply(line.quantity));
                order_items.push(OrderItemRecord {
                    id: Uuid::new_v4(),
                    order_id,
                    product_id: line.product.id,
                    product_name: line.product.name.clone(),
                    product_description: line.product.description.clone(),
                    quantity: line.quantity,
                    price: line.product.price,
                });
            }

            group_total = group_total.add(order_total);
            orders.push(OrderRecord {
                id: order_id,
                group_id,
                shop_id,
                status: OrderStatus::Pending,
                total: order_total,
                is_paid: false,
                paid_at: None,
                is_delivered: false,
                is_picked_up: false,
                delivery_date: None,
                created_at: now,
                processing_at: None,
                shipped_at: None,
                completed_at: None,
                cancelled_at: None,
                restocked_at: None,
            });
        }

        if request.fulfillment_method == FulfillmentMethod::Delivery {
            group_total = group_total.add(self.delivery_fee);
        }

        let group = OrderGroupRecord {
            id: group_id,
            user_id: request.user_id,
            shipping_address,
            fulfillment_method: request.fulfillment_method,
            payment_method: request.payment_method,
            status: GroupStatus::Pending,
            total: group_total,
            created_at: now,
            cancelled_at: None,
        };

        tx.insert_order_group(&group).await?;
        for order in &orders {
            tx.insert_order(order).await?;
        }
        for item in &order_items {
            tx.insert_order_item(item).await?;
        }
        tx.delete_cart_items(request.user_id).await?;
        tx.commit().await?;

        metrics::counter!("checkouts_total").increment(1);
        tracing::info!(
            group_id = %group.id,
            orders = orders.len(),
            total_cents = group.total.cents(),
            "checkout complete"
        );

        Ok(CheckoutReceipt { group, orders })
    }

    async fn resolve_shipping(
        &self,
        tx: &mut S::Tx,
        request: &CheckoutRequest,
    ) -> Result<Option<AddressSnapshot>, DomainError> {
        if request.fulfillment_method != FulfillmentMethod::Delivery {
            return Ok(None);
        }

        let address_id = request
            .shipping_address_id
            .ok_or(DomainError::MissingShippingAddress)?;
        let address = tx
            .get_address(request.user_id, address_id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "shipping address",
                id: address_id.to_string(),
            })?;

        Ok(Some(AddressSnapshot::from(&address)))
    }
}

//! Row record types shared by both store implementations.

use chrono::{DateTime, Utc};
use common::{
    AddressId, FulfillmentMethod, GroupStatus, Money, OrderGroupId, OrderId, OrderStatus,
    PaymentMethod, ProductId, ShopId, UserId,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A product in the shop directory, read-only to the transactional core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub shop_id: ShopId,
    pub name: String,
    pub description: String,
    pub price: Money,
    /// Deactivated products stay in the directory but cannot be ordered.
    pub active: bool,
}

/// The authoritative stock counter for a product.
///
/// Owned one-to-one by its product and mutated only under a row lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRecord {
    pub product_id: ProductId,
    pub stock: i64,
    /// Audit tag of the last mutator (`user:<uuid>` or `system:<job>`).
    pub last_updated_by: String,
    pub updated_at: DateTime<Utc>,
}

/// One line of a customer's cart: one row per distinct product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItemRecord {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A customer shipping address resolvable at checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub id: AddressId,
    pub user_id: UserId,
    pub recipient: String,
    pub phone: String,
    pub line1: String,
    pub city: String,
    pub region: String,
}

/// Address details copied onto an order group at checkout.
///
/// A snapshot, not a reference: later edits to the address book must not
/// change where an already-placed group ships.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressSnapshot {
    pub recipient: String,
    pub phone: String,
    pub line1: String,
    pub city: String,
    pub region: String,
}

impl From<&AddressRecord> for AddressSnapshot {
    fn from(record: &AddressRecord) -> Self {
        Self {
            recipient: record.recipient.clone(),
            phone: record.phone.clone(),
            line1: record.line1.clone(),
            city: record.city.clone(),
            region: record.region.clone(),
        }
    }
}

/// One checkout transaction for one customer.
///
/// `status` is a deterministic aggregate of the child orders' statuses; it
/// is only ever written at creation, on direct group cancel, or by the
/// aggregate recomputation that follows an order transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderGroupRecord {
    pub id: OrderGroupId,
    pub user_id: UserId,
    /// Present for delivery groups, absent for pickup.
    pub shipping_address: Option<AddressSnapshot>,
    pub fulfillment_method: FulfillmentMethod,
    pub payment_method: PaymentMethod,
    pub status: GroupStatus,
    pub total: Money,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// The fulfillment unit scoped to one shop within an order group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    pub group_id: OrderGroupId,
    pub shop_id: ShopId,
    pub status: OrderStatus,
    pub total: Money,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub is_delivered: bool,
    pub is_picked_up: bool,
    pub delivery_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub processing_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Set once the cancellation restock compensation has run; guards the
    /// compensation against double-crediting stock on a retried task.
    pub restocked_at: Option<DateTime<Utc>>,
}

/// Immutable snapshot of a product at the moment it was ordered.
///
/// Carries its own copy of name, description and price so later product
/// edits or deletion cannot corrupt historical orders. `product_id` is kept
/// for restocking but is not a foreign key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItemRecord {
    pub id: Uuid,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub product_description: String,
    pub quantity: u32,
    pub price: Money,
}

/// Gateway payment state for a digital order group (one-to-one).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub group_id: OrderGroupId,
    /// Gateway transaction reference; unique, rotated on re-initialization
    /// while unverified, immutable once verified.
    pub reference: String,
    pub amount: Money,
    pub verified: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub refund_requested: bool,
    pub refunded: bool,
    pub created_at: DateTime<Utc>,
}

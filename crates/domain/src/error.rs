//! Domain error taxonomy.

use common::{GroupStatus, OrderStatus, ProductId};
use storage::StorageError;
use thiserror::Error;

use crate::cart::CartReport;

/// Errors that can occur in the transactional core.
///
/// Validation errors are detected before any mutation; concurrency-detected
/// violations abort the whole transaction, so the caller observes the same
/// error either way with no partial effect.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A stock mutation or cart line with a non-positive quantity.
    #[error("invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// Requested more units than the locked stock row holds.
    #[error("insufficient stock for product {product_id}: {available} available")]
    InsufficientStock {
        product_id: ProductId,
        available: i64,
    },

    /// Checkout attempted with no cart lines.
    #[error("cart is empty")]
    EmptyCart,

    /// At least one cart line is not available.
    #[error("cart has unavailable lines")]
    InvalidCart { report: CartReport },

    /// The requested target status is not reachable from the current one.
    #[error("invalid status transition: {from} -> {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// The order is already in the requested status.
    #[error("order is already {status}")]
    AlreadyInState { status: OrderStatus },

    /// A payment precondition for the requested transition is unmet.
    #[error("invalid payment status: {reason}")]
    InvalidPaymentStatus { reason: &'static str },

    /// Shipping requires a delivery date in the future.
    #[error("invalid delivery date: {reason}")]
    InvalidDeliveryDate { reason: &'static str },

    /// Delivery checkout without a shipping address.
    #[error("a shipping address is required for delivery")]
    MissingShippingAddress,

    /// A referenced entity does not exist (or is not visible to the caller).
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Customer cancellation attempted on a group that is no longer pending.
    #[error("order group is {status} and can no longer be cancelled")]
    GroupNotCancellable { status: GroupStatus },

    /// Customer cancellation attempted after the window closed.
    #[error("the cancellation window has expired")]
    CancellationWindowExpired,

    /// An error occurred in the persistence layer.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl DomainError {
    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::InvalidQuantity { .. } => "invalid_quantity",
            DomainError::InsufficientStock { .. } => "insufficient_stock",
            DomainError::EmptyCart => "empty_cart",
            DomainError::InvalidCart { .. } => "invalid_cart",
            DomainError::InvalidStatusTransition { .. } => "invalid_status_transition",
            DomainError::AlreadyInState { .. } => "already_in_state",
            DomainError::InvalidPaymentStatus { .. } => "invalid_payment_status",
            DomainError::InvalidDeliveryDate { .. } => "invalid_delivery_date",
            DomainError::MissingShippingAddress => "missing_shipping_address",
            DomainError::NotFound { .. } => "not_found",
            DomainError::GroupNotCancellable { .. } => "group_not_cancellable",
            DomainError::CancellationWindowExpired => "cancellation_window_expired",
            DomainError::Storage(_) => "storage_error",
        }
    }
}

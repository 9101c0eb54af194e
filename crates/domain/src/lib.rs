//! The transactional core of the marketplace.
//!
//! Everything here is written generically over [`storage::MarketStore`],
//! so the same logic runs against PostgreSQL in production and the
//! in-memory store in tests:
//!
//! - [`ledger`] — the stock add/subtract primitives, executed under a
//!   row-level lock.
//! - [`cart`] — cart validation with a per-line availability report.
//! - [`checkout`] — the cart-to-order-group conversion, one transaction,
//!   stock decremented exactly once per line.
//! - [`rules`] — the pure order transition rule table.
//! - [`orders`] — the locking transition executor, group aggregate
//!   recomputation, and the cancellation operations.
//! - [`capability`] — the centralized actor/resource permission check.

pub mod capability;
pub mod cart;
pub mod checkout;
mod error;
pub mod ledger;
pub mod orders;
pub mod rules;

pub use cart::{CartLine, CartReport, LineReport, LineStatus};
pub use checkout::{CheckoutReceipt, CheckoutRequest, CheckoutService};
pub use error::DomainError;
pub use orders::OrderService;
pub use rules::TransitionRequest;

use chrono::Duration;

/// How long after creation a customer may still cancel a pending group,
/// and how old an unpaid digital group must be before auto-cancellation.
pub const CANCELLATION_WINDOW_HOURS: i64 = 4;

/// The cancellation window as a [`Duration`].
pub fn cancellation_window() -> Duration {
    Duration::hours(CANCELLATION_WINDOW_HOURS)
}

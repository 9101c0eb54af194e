//! Shared types for the marketplace backend.
//!
//! Typed identifiers, the [`Money`] minor-unit amount type, and the status
//! enums used across the storage, domain, payment and worker crates.

mod ids;
mod money;
mod status;

pub use ids::{AddressId, OrderGroupId, OrderId, ProductId, ShopId, UserId};
pub use money::Money;
pub use status::{
    FulfillmentMethod, GroupStatus, InvalidEnumValue, OrderStatus, PaymentMethod,
};

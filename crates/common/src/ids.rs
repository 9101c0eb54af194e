//! Typed identifiers.
//!
//! Every entity gets its own UUID newtype so a [`ProductId`] can never be
//! passed where an [`OrderId`] is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id! {
    /// Identifier of a customer account.
    UserId
}

uuid_id! {
    /// Identifier of a shop selling on the marketplace.
    ShopId
}

uuid_id! {
    /// Identifier of a product in the shop directory.
    ProductId
}

uuid_id! {
    /// Identifier of a per-shop order within an order group.
    OrderId
}

uuid_id! {
    /// Identifier of one checkout transaction (a group of per-shop orders).
    OrderGroupId
}

uuid_id! {
    /// Identifier of a customer shipping address.
    AddressId
}

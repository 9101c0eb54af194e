//! Order lifecycle statuses and checkout method enums.

use serde::{Deserialize, Serialize};

/// Error returned when parsing a status or method from its text form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidEnumValue {
    /// The name of the enum that failed to parse.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

impl std::fmt::Display for InvalidEnumValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {} value: {:?}", self.kind, self.value)
    }
}

impl std::error::Error for InvalidEnumValue {}

/// The state of a per-shop order in its lifecycle.
///
/// ```text
/// Pending ──► Processing ──► Shipped ──► Completed   (delivery)
///    │            │    └──────────────► Completed    (pickup)
///    └────────────┴──► Cancelled
/// ```
///
/// The transition rules (payment preconditions, delivery dates, fulfillment
/// method) live in the domain crate; this enum only knows its own shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order was created by checkout and awaits the shop.
    #[default]
    Pending,

    /// The shop accepted the order and is preparing it.
    Processing,

    /// Order is on its way to the customer (delivery only).
    Shipped,

    /// Order was handed over (terminal state).
    Completed,

    /// Order was cancelled (terminal state).
    Cancelled,
}

impl OrderStatus {
    /// Returns true if this is a terminal state (no further transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Returns true if the order can still be cancelled.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Processing)
    }

    /// Returns the status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = InvalidEnumValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(InvalidEnumValue {
                kind: "order status",
                value: other.to_string(),
            }),
        }
    }
}

/// Aggregate status of an order group, derived from its child orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    /// No child order has reached a terminal state yet.
    #[default]
    Pending,

    /// At least one child order is terminal, but not all are completed.
    PartiallyFulfilled,

    /// Every child order completed.
    Fulfilled,

    /// The whole group was cancelled.
    Cancelled,
}

impl GroupStatus {
    /// Returns the status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupStatus::Pending => "pending",
            GroupStatus::PartiallyFulfilled => "partially_fulfilled",
            GroupStatus::Fulfilled => "fulfilled",
            GroupStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for GroupStatus {
    type Err = InvalidEnumValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(GroupStatus::Pending),
            "partially_fulfilled" => Ok(GroupStatus::PartiallyFulfilled),
            "fulfilled" => Ok(GroupStatus::Fulfilled),
            "cancelled" => Ok(GroupStatus::Cancelled),
            other => Err(InvalidEnumValue {
                kind: "group status",
                value: other.to_string(),
            }),
        }
    }
}

/// How the customer receives the goods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentMethod {
    /// Customer collects from the shop; orders skip the shipped state.
    Pickup,
    /// Goods are shipped; a flat delivery fee applies at checkout.
    Delivery,
}

impl FulfillmentMethod {
    /// Returns the method name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentMethod::Pickup => "pickup",
            FulfillmentMethod::Delivery => "delivery",
        }
    }
}

impl std::fmt::Display for FulfillmentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for FulfillmentMethod {
    type Err = InvalidEnumValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pickup" => Ok(FulfillmentMethod::Pickup),
            "delivery" => Ok(FulfillmentMethod::Delivery),
            other => Err(InvalidEnumValue {
                kind: "fulfillment method",
                value: other.to_string(),
            }),
        }
    }
}

/// How the group is paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Paid in person; marked paid by the shop at completion.
    Cash,
    /// Paid through the hosted payment gateway before fulfillment.
    Digital,
}

impl PaymentMethod {
    /// Returns the method name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Digital => "digital",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = InvalidEnumValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(PaymentMethod::Cash),
            "digital" => Ok(PaymentMethod::Digital),
            other => Err(InvalidEnumValue {
                kind: "payment method",
                value: other.to_string(),
            }),
        }
    }
}

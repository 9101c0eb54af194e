//! Transactional outbox task types.

use chrono::{DateTime, Utc};
use common::OrderId;
use serde::{Deserialize, Serialize};

/// The work a background task performs, serialized as JSON in the outbox
/// row. Enqueued inside the transaction that makes the task necessary, so
/// a task can never observe a half-committed state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskPayload {
    /// Re-credit stock for the items of a cancelled order.
    Restock { order_id: OrderId },
    /// Re-query the payment gateway and reconcile a payment by reference.
    VerifyPayment { reference: String },
}

impl TaskPayload {
    /// Short task kind label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            TaskPayload::Restock { .. } => "restock",
            TaskPayload::VerifyPayment { .. } => "verify_payment",
        }
    }
}

/// Delivery state of an outbox row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    /// Waiting to be claimed (possibly after a retry delay).
    Pending,
    /// Executed successfully.
    Done,
    /// Failed permanently after exhausting its attempts.
    Dead,
}

impl OutboxStatus {
    /// Returns the status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "pending",
            OutboxStatus::Done => "done",
            OutboxStatus::Dead => "dead",
        }
    }
}

impl std::str::FromStr for OutboxStatus {
    type Err = common::InvalidEnumValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OutboxStatus::Pending),
            "done" => Ok(OutboxStatus::Done),
            "dead" => Ok(OutboxStatus::Dead),
            other => Err(common::InvalidEnumValue {
                kind: "outbox status",
                value: other.to_string(),
            }),
        }
    }
}

/// A claimed outbox row handed to the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxTask {
    pub id: i64,
    pub payload: TaskPayload,
    /// Number of claims so far, including the one that produced this value.
    pub attempts: i32,
    pub status: OutboxStatus,
    pub next_attempt_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

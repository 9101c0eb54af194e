//! Payment error types.

use common::GroupStatus;
use storage::StorageError;
use thiserror::Error;

/// Errors that can occur during payment operations.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The webhook signature did not match the request body.
    #[error("webhook signature is invalid")]
    SignatureInvalid,

    /// The payment is already verified; its reference is immutable.
    #[error("payment has already been verified")]
    DuplicateTransaction,

    /// The order group is not paid through the gateway.
    #[error("order group does not use digital payment")]
    NotDigital,

    /// Payment initialization on a group that is past pending.
    #[error("order group is {status} and can no longer be paid")]
    GroupNotPayable { status: GroupStatus },

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The gateway failed or reported an unsuccessful charge.
    #[error("payment gateway error: {0}")]
    Gateway(String),

    /// An error occurred in the persistence layer.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl PaymentError {
    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            PaymentError::SignatureInvalid => "signature_invalid",
            PaymentError::DuplicateTransaction => "duplicate_transaction",
            PaymentError::NotDigital => "not_digital",
            PaymentError::GroupNotPayable { .. } => "group_not_payable",
            PaymentError::NotFound { .. } => "not_found",
            PaymentError::Gateway(_) => "gateway_error",
            PaymentError::Storage(_) => "storage_error",
        }
    }

    /// Whether a background task hitting this error should retry.
    ///
    /// Gateway trouble (network, upstream hiccup, charge not settled yet)
    /// and storage contention are transient. Signature and lookup failures
    /// are not: retrying cannot fix them.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PaymentError::Gateway(_) | PaymentError::Storage(_))
    }
}

//! Worker error types.

use domain::DomainError;
use payment::PaymentError;
use storage::StorageError;
use thiserror::Error;

/// Errors that can occur while executing background work.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// An error from the transactional core.
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),

    /// An error from the payment layer.
    #[error("payment error: {0}")]
    Payment(#[from] PaymentError),

    /// An error from the persistence layer.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl WorkerError {
    /// Whether the failed task should be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Storage(_) => true,
            WorkerError::Payment(e) => e.is_retryable(),
            WorkerError::Domain(e) => matches!(e, DomainError::Storage(_)),
        }
    }
}

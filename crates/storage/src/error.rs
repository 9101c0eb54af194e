//! Storage error types.

use common::InvalidEnumValue;
use thiserror::Error;

/// Errors that can occur in the persistence layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An error occurred talking to the database.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A task payload could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored text value did not parse back into its enum.
    #[error("corrupt row: {0}")]
    Decode(#[from] InvalidEnumValue),
}

/// Convenience type alias for storage results.
pub type Result<T> = std::result::Result<T, StorageError>;

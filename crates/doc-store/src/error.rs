use thiserror::Error;

use crate::{DocumentKey, Precondition, Version};

/// Errors that can occur when interacting with the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write precondition did not hold when the batch was committed.
    /// Nothing in the batch was applied.
    #[error("Concurrency conflict on {key}: expected {expected}, found version {actual}")]
    ConcurrencyConflict {
        key: DocumentKey,
        expected: Precondition,
        actual: Version,
    },

    /// The batch was rejected before touching the store.
    #[error("Invalid write batch: {0}")]
    InvalidBatch(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true if retrying the same logical operation may succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::ConcurrencyConflict { .. })
    }
}

/// Result type for document store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

//! Error types for the timeline and seen-state layer.

/// Errors that can occur during timeline operations.
#[derive(Debug, thiserror::Error)]
pub enum TimelineError {
    /// The referenced transaction does not exist.
    #[error("transaction not found: {0}")]
    TransactionNotFound(String),

    /// A transaction with this id is already registered.
    #[error("transaction already exists: {0}")]
    TransactionExists(String),

    /// A database operation failed.
    #[error("timeline database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON serialization or deserialization failed.
    #[error("timeline serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

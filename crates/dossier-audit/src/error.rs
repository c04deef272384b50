//! Error types for the audit trail.

/// Errors that can occur while writing or reading audit records.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// A database operation failed.
    #[error("audit database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No pooled connection could be obtained.
    #[error("audit connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

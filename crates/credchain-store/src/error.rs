//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The backend could not be reached (poisoned lock, failed worker task).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The generated public id is already taken; the caller should
    /// regenerate and retry.
    #[error("public id already taken: {0}")]
    PublicIdTaken(String),

    /// A write was rejected and rolled back.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

//! Error types for the storage layer.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Entity not found.
    #[error("entity not found: {0}")]
    NotFound(String),

    /// A row already exists under the same unique key.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// IO error (file system).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data that does not decode to a valid value.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Another thread panicked while holding the connection.
    #[error("database connection lock poisoned")]
    LockPoisoned,
}

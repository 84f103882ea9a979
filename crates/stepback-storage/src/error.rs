//! Storage error types.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// IO error (permission denied, disk full, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid document name
    #[error("Invalid document name: {0:?}")]
    InvalidName(String),

    /// Lock was poisoned (another thread panicked while holding the lock)
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

impl StorageError {
    /// Create an invalid name error.
    pub fn invalid_name(name: impl Into<String>) -> Self {
        Self::InvalidName(name.into())
    }

    /// Whether the stored document exists but could not be parsed.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Json(_))
    }
}

//! Storage layer for stepback.
//!
//! Each project keeps a handful of small JSON documents (the snapshot index,
//! the project configuration) under its hidden directory. Documents are
//! always read and written whole; there are no partial updates.
//!
//! Backends:
//! - JSON file storage (default), written atomically via temp file + rename
//! - In-memory storage (for testing)

pub mod error;
pub mod json;
pub mod memory;

pub use error::{StorageError, StorageResult};
pub use json::JsonStorage;
pub use memory::MemoryStorage;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

/// A store of named JSON documents.
///
/// Names are single path-free segments such as `"snapshots"`.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read a document.
    ///
    /// Returns `None` if the document doesn't exist.
    async fn read<T: DeserializeOwned + Send>(&self, name: &str) -> StorageResult<Option<T>>;

    /// Replace a document in full.
    async fn write<T: Serialize + Send + Sync>(&self, name: &str, value: &T) -> StorageResult<()>;

    /// Remove a document. Removing a missing document is not an error.
    async fn remove(&self, name: &str) -> StorageResult<()>;

    /// Check if a document exists.
    async fn exists(&self, name: &str) -> StorageResult<bool>;
}

/// Reject names that could escape the storage root.
pub(crate) fn validate_name(name: &str) -> StorageResult<()> {
    if name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name == "."
        || name == ".."
    {
        return Err(StorageError::invalid_name(name));
    }
    Ok(())
}

//! In-memory storage implementation for testing.

use crate::{validate_name, Storage, StorageError, StorageResult};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory storage for testing.
///
/// Documents are kept as serialized JSON strings so round-trips exercise
/// the same serde paths as the file backend.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create a new in-memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw text under a name, bypassing serialization.
    ///
    /// Lets tests plant corrupt documents.
    pub fn insert_raw(&self, name: &str, raw: impl Into<String>) -> StorageResult<()> {
        let mut data = self
            .data
            .write()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?;
        data.insert(name.to_string(), raw.into());
        Ok(())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn read<T: DeserializeOwned + Send>(&self, name: &str) -> StorageResult<Option<T>> {
        validate_name(name)?;
        let data = self
            .data
            .read()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?;

        match data.get(name) {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }

    async fn write<T: Serialize + Send + Sync>(&self, name: &str, value: &T) -> StorageResult<()> {
        validate_name(name)?;
        let json = serde_json::to_string(value)?;
        self.insert_raw(name, json)
    }

    async fn remove(&self, name: &str) -> StorageResult<()> {
        validate_name(name)?;
        let mut data = self
            .data
            .write()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?;
        data.remove(name);
        Ok(())
    }

    async fn exists(&self, name: &str) -> StorageResult<bool> {
        validate_name(name)?;
        let data = self
            .data
            .read()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?;
        Ok(data.contains_key(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_round_trip_and_remove() {
        let storage = MemoryStorage::new();

        storage.write("counter", &7u32).await.unwrap();
        assert_eq!(storage.read::<u32>("counter").await.unwrap(), Some(7));
        assert!(storage.exists("counter").await.unwrap());

        storage.remove("counter").await.unwrap();
        assert_eq!(storage.read::<u32>("counter").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_raw_corrupt_document() {
        let storage = MemoryStorage::new();
        storage.insert_raw("counter", "nope").unwrap();

        let err = storage.read::<u32>("counter").await.unwrap_err();
        assert!(err.is_corrupt());
    }
}

//! JSON file-based storage implementation.
//!
//! Each document is a separate pretty-printed JSON file directly under the
//! base directory: `snapshots` -> `<base>/snapshots.json`.

use crate::{validate_name, Storage, StorageError, StorageResult};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// JSON file-based storage.
#[derive(Debug, Clone)]
pub struct JsonStorage {
    base_path: PathBuf,
}

impl JsonStorage {
    /// Create a new JSON storage at the given base path.
    ///
    /// The directory is created lazily on first write.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// The directory documents live in.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Get the file path for a document.
    pub fn document_path(&self, name: &str) -> StorageResult<PathBuf> {
        validate_name(name)?;
        Ok(self.base_path.join(format!("{name}.json")))
    }
}

#[async_trait]
impl Storage for JsonStorage {
    async fn read<T: DeserializeOwned + Send>(&self, name: &str) -> StorageResult<Option<T>> {
        let path = self.document_path(name)?;
        debug!(path = %path.display(), "Reading document");

        match fs::read_to_string(&path).await {
            Ok(content) => {
                let value: T = serde_json::from_str(&content)?;
                Ok(Some(value))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn write<T: Serialize + Send + Sync>(&self, name: &str, value: &T) -> StorageResult<()> {
        let path = self.document_path(name)?;
        debug!(path = %path.display(), "Writing document");

        fs::create_dir_all(&self.base_path).await?;

        let mut content = serde_json::to_string_pretty(value)?;
        content.push('\n');

        // Readers never observe a half-written document.
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &content).await?;
        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::Io(e));
        }

        Ok(())
    }

    async fn remove(&self, name: &str) -> StorageResult<()> {
        let path = self.document_path(name)?;
        debug!(path = %path.display(), "Removing document");

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn exists(&self, name: &str) -> StorageResult<bool> {
        let path = self.document_path(name)?;
        Ok(fs::try_exists(&path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::tempdir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
    struct Counter {
        label: String,
        next: u32,
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let dir = tempdir().unwrap();
        let storage = JsonStorage::new(dir.path().join(".stepback"));

        let counter = Counter {
            label: "snapshots".to_string(),
            next: 42,
        };

        storage.write("counter", &counter).await.unwrap();

        let read: Option<Counter> = storage.read("counter").await.unwrap();
        assert_eq!(read, Some(counter));
        assert!(dir.path().join(".stepback/counter.json").exists());
        assert!(!dir.path().join(".stepback/counter.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_read_not_found() {
        let dir = tempdir().unwrap();
        let storage = JsonStorage::new(dir.path());

        let read: Option<Counter> = storage.read("nonexistent").await.unwrap();
        assert_eq!(read, None);
    }

    #[tokio::test]
    async fn test_read_corrupt_document() {
        let dir = tempdir().unwrap();
        let storage = JsonStorage::new(dir.path());
        tokio::fs::write(dir.path().join("counter.json"), "{ not json")
            .await
            .unwrap();

        let err = storage.read::<Counter>("counter").await.unwrap_err();
        assert!(err.is_corrupt());
    }

    #[tokio::test]
    async fn test_write_replaces_whole_document() {
        let dir = tempdir().unwrap();
        let storage = JsonStorage::new(dir.path());

        storage
            .write(
                "counter",
                &Counter {
                    label: "a much longer first label".to_string(),
                    next: 1,
                },
            )
            .await
            .unwrap();
        storage
            .write(
                "counter",
                &Counter {
                    label: "b".to_string(),
                    next: 2,
                },
            )
            .await
            .unwrap();

        let read: Counter = storage.read("counter").await.unwrap().unwrap();
        assert_eq!(read.label, "b");
        assert_eq!(read.next, 2);
    }

    #[tokio::test]
    async fn test_remove_and_exists() {
        let dir = tempdir().unwrap();
        let storage = JsonStorage::new(dir.path());

        storage.write("counter", &Counter::default()).await.unwrap();
        assert!(storage.exists("counter").await.unwrap());

        storage.remove("counter").await.unwrap();
        assert!(!storage.exists("counter").await.unwrap());

        // Removing twice is fine
        storage.remove("counter").await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_names() {
        let dir = tempdir().unwrap();
        let storage = JsonStorage::new(dir.path());

        for name in ["", ".", "..", "a/b", "a\\b"] {
            let result = storage.write(name, &Counter::default()).await;
            assert!(matches!(result, Err(StorageError::InvalidName(_))), "{name}");
        }
    }
}

//! Metadata index persistence.

use crate::{MetadataIndex, SnapshotResult};
use stepback_storage::{JsonStorage, Storage};
use std::path::Path;
use tracing::{debug, warn};

/// Document name of the index inside the project's hidden directory.
pub const INDEX_DOCUMENT: &str = "snapshots";

/// Reads and writes a project's [`MetadataIndex`].
///
/// A missing index is an empty one. An unreadable index is treated the
/// same way: tags are the source of truth and reconciliation rebuilds it.
pub struct MetadataStore<S: Storage = JsonStorage> {
    storage: S,
}

impl MetadataStore<JsonStorage> {
    /// Store rooted at `<project>/<dir_name>/snapshots.json`.
    pub fn for_project(project: &Path, dir_name: &str) -> Self {
        Self::new(JsonStorage::new(stepback_util::path::project_dir(
            project, dir_name,
        )))
    }
}

impl<S: Storage> MetadataStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Load the index, defaulting when absent or corrupt.
    pub async fn load(&self) -> SnapshotResult<MetadataIndex> {
        match self.storage.read::<MetadataIndex>(INDEX_DOCUMENT).await {
            Ok(Some(index)) => Ok(index),
            Ok(None) => {
                debug!("No snapshot index yet");
                Ok(MetadataIndex::default())
            }
            Err(e) if e.is_corrupt() => {
                warn!(error = %e, "Snapshot index is unreadable; rebuilding from tags");
                Ok(MetadataIndex::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Rewrite the index in full.
    pub async fn save(&self, index: &MetadataIndex) -> SnapshotResult<()> {
        debug_assert!(
            index.is_consistent(),
            "refusing to persist inconsistent index"
        );
        self.storage.write(INDEX_DOCUMENT, index).await?;
        debug!(
            snapshots = index.len(),
            next_version = index.next_version,
            current_version = ?index.current_version,
            "Saved snapshot index"
        );
        Ok(())
    }

    /// Whether an index has been written.
    pub async fn exists(&self) -> SnapshotResult<bool> {
        Ok(self.storage.exists(INDEX_DOCUMENT).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Snapshot;
    use stepback_storage::MemoryStorage;

    #[tokio::test]
    async fn test_load_missing_is_default() {
        let store = MetadataStore::new(MemoryStorage::new());
        assert_eq!(store.load().await.unwrap(), MetadataIndex::default());
        assert!(!store.exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_load_corrupt_is_default() {
        let storage = MemoryStorage::new();
        storage.insert_raw(INDEX_DOCUMENT, "{\"snapshots\": [").unwrap();
        let store = MetadataStore::new(storage);

        assert_eq!(store.load().await.unwrap(), MetadataIndex::default());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let store = MetadataStore::new(MemoryStorage::new());
        let mut index = MetadataIndex::default();
        index.record(Snapshot::new(1, "abc123", vec!["a.txt".into()]));

        store.save(&index).await.unwrap();
        assert_eq!(store.load().await.unwrap(), index);
    }

    #[tokio::test]
    async fn test_project_store_writes_hidden_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::for_project(dir.path(), ".stepback");

        store.save(&MetadataIndex::default()).await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join(".stepback/snapshots.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["nextVersion"], 1);
        assert!(json["currentVersion"].is_null());
        assert_eq!(json["snapshots"], serde_json::json!([]));
    }
}

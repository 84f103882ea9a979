//! The snapshot engine.
//!
//! [`SnapshotEngine`] is the entry point for every snapshot operation.
//! Each call takes the project's lock from the engine's [`LockRegistry`]
//! before touching git or the index, so operations on one project never
//! interleave.

use crate::events::{EventSink, NoopSink};
use crate::git::{GitExecutor, ProcessGit, Repository};
use crate::metadata::MetadataStore;
use crate::{
    catalog, create, prune, restore, LockRegistry, RepoStatus, Snapshot, SnapshotConfig,
    SnapshotResult,
};
use std::path::Path;
use std::sync::Arc;
use stepback_util::path::PROJECT_DIR_NAME;
use tracing::instrument;

/// Everything an operation needs to act on one project.
pub(crate) struct Project<'a> {
    pub path: &'a Path,
    pub repo: Repository,
    pub store: MetadataStore,
    pub config: &'a SnapshotConfig,
    pub events: &'a dyn EventSink,
}

impl Project<'_> {
    /// Keep stepback's own directories out of status, snapshots and
    /// `git clean`.
    ///
    /// `info/exclude` is local to a clone, so this runs before any
    /// operation that reads status or writes the index.
    pub async fn exclude_private_dirs(&self) -> SnapshotResult<()> {
        let metadata_dir = self.config.metadata_dir.trim_matches('/');
        self.repo.ensure_excluded(metadata_dir).await?;
        // Project configuration always lives under the default directory.
        if metadata_dir != PROJECT_DIR_NAME {
            self.repo.ensure_excluded(PROJECT_DIR_NAME).await?;
        }
        Ok(())
    }
}

/// Automatic checkpoints for project directories.
///
/// One engine can serve any number of projects; it keeps no per-project
/// state beyond lock entries.
pub struct SnapshotEngine {
    git: Arc<dyn GitExecutor>,
    locks: LockRegistry,
    events: Arc<dyn EventSink>,
    config: SnapshotConfig,
}

impl SnapshotEngine {
    /// Create an engine running the system `git`.
    pub fn new(config: SnapshotConfig) -> Self {
        let git = ProcessGit::new(config.command_timeout());
        Self {
            git: Arc::new(git),
            locks: LockRegistry::new(),
            events: Arc::new(NoopSink),
            config,
        }
    }

    /// Replace the command executor.
    pub fn with_executor(mut self, git: Arc<dyn GitExecutor>) -> Self {
        self.git = git;
        self
    }

    /// Replace the event sink.
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Share a lock registry with other engines.
    pub fn with_locks(mut self, locks: LockRegistry) -> Self {
        self.locks = locks;
        self
    }

    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    pub fn locks(&self) -> &LockRegistry {
        &self.locks
    }

    fn project<'a>(&'a self, path: &'a Path) -> Project<'a> {
        Project {
            path,
            repo: Repository::new(Arc::clone(&self.git), path),
            store: MetadataStore::for_project(path, &self.config.metadata_dir),
            config: &self.config,
            events: self.events.as_ref(),
        }
    }

    /// Snapshot all pending changes.
    ///
    /// Initializes a repository when the project has none. Returns `None`
    /// when there is nothing to snapshot, a rebase or merge is in progress,
    /// or snapshots are disabled.
    #[instrument(skip(self, path), fields(project = %path.display()))]
    pub async fn create_snapshot(&self, path: &Path) -> SnapshotResult<Option<Snapshot>> {
        let project = self.project(path);
        self.locks
            .with_lock(path, create::create_snapshot(&project))
            .await
    }

    /// All snapshots of a project, ascending by version.
    ///
    /// Repairs the index when it has drifted from the tags.
    #[instrument(skip(self, path), fields(project = %path.display()))]
    pub async fn list_snapshots(&self, path: &Path) -> SnapshotResult<Vec<Snapshot>> {
        let project = self.project(path);
        self.locks
            .with_lock(path, catalog::list_snapshots(&project))
            .await
    }

    /// Look up a single snapshot.
    pub async fn get_snapshot(&self, path: &Path, version: u32) -> SnapshotResult<Snapshot> {
        let project = self.project(path);
        self.locks
            .with_lock(path, async {
                restore::locate(&project, version)
                    .await
                    .map(|(_, snapshot)| snapshot)
            })
            .await
    }

    /// Version the working tree was last snapshotted at or restored to.
    pub async fn current_version(&self, path: &Path) -> SnapshotResult<Option<u32>> {
        let project = self.project(path);
        self.locks
            .with_lock(path, async {
                project
                    .store
                    .load()
                    .await
                    .map(|index| index.current_version)
            })
            .await
    }

    /// Reset the working tree to a snapshot.
    ///
    /// Fails with [`crate::SnapshotError::UncommittedChanges`] when changes are
    /// pending and `force` is false.
    #[instrument(skip(self, path), fields(project = %path.display()))]
    pub async fn restore_snapshot(
        &self,
        path: &Path,
        version: u32,
        force: bool,
    ) -> SnapshotResult<Snapshot> {
        let project = self.project(path);
        self.locks
            .with_lock(path, restore::restore_snapshot(&project, version, force))
            .await
    }

    /// Keep only the `keep_last` newest snapshots. Returns how many were removed.
    #[instrument(skip(self, path), fields(project = %path.display()))]
    pub async fn prune_snapshots(&self, path: &Path, keep_last: usize) -> SnapshotResult<usize> {
        let project = self.project(path);
        self.locks
            .with_lock(path, prune::prune_snapshots(&project, keep_last))
            .await
    }

    /// Remove one snapshot's tag and index entry.
    #[instrument(skip(self, path), fields(project = %path.display()))]
    pub async fn delete_snapshot(&self, path: &Path, version: u32) -> SnapshotResult<Snapshot> {
        let project = self.project(path);
        self.locks
            .with_lock(path, prune::delete_snapshot(&project, version))
            .await
    }

    /// Current repository status.
    pub async fn repository_status(&self, path: &Path) -> SnapshotResult<RepoStatus> {
        let project = self.project(path);
        self.locks
            .with_lock(path, catalog::repository_status(&project))
            .await
    }

    /// Unified diff of the working tree against a snapshot.
    pub async fn diff_snapshot(&self, path: &Path, version: u32) -> SnapshotResult<String> {
        let project = self.project(path);
        self.locks
            .with_lock(path, restore::diff_snapshot(&project, version))
            .await
    }
}

impl Default for SnapshotEngine {
    fn default() -> Self {
        Self::new(SnapshotConfig::default())
    }
}

impl std::fmt::Debug for SnapshotEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotEngine")
            .field("config", &self.config)
            .field("active_locks", &self.locks.active())
            .finish_non_exhaustive()
    }
}


//! Automatic git-backed checkpoints for stepback.
//!
//! Turns a project directory into its own revision history. Right before an
//! agent acts on the project, [`SnapshotEngine::create_snapshot`] commits
//! everything pending and tags the commit `snapshot-v<N>`. Every snapshot can
//! be listed, diffed, restored, pruned or deleted.
//!
//! Two sources of truth are kept in agreement:
//! - git tags, the durable record of which snapshots exist
//! - a JSON index in `<project>/.stepback/snapshots.json`, a self-healing
//!   cache rebuilt from the tags whenever they drift apart
//!
//! All operations on one project are serialized through a per-project lock.
//!
//! # Example
//!
//! ```no_run
//! use stepback_snapshot::{SnapshotConfig, SnapshotEngine};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = SnapshotEngine::new(SnapshotConfig::default());
//! let project = Path::new("/project/root");
//!
//! // Checkpoint before the agent edits anything
//! if let Some(snapshot) = engine.create_snapshot(project).await? {
//!     println!("saved {}", snapshot.tag);
//! }
//!
//! // ... the agent edits files ...
//!
//! // Roll back, discarding whatever the agent left behind
//! engine.restore_snapshot(project, 1, true).await?;
//! # Ok(())
//! # }
//! ```

mod catalog;
mod create;
mod engine;
mod error;
mod lock;
mod prune;
mod restore;
mod snapshot;

pub mod config;
pub mod events;
pub mod git;
pub mod metadata;
pub mod status;
pub mod trigger;

pub use catalog::{missing_versions, reconcile, Reconciliation};
pub use config::{ConfigLayer, ExecutionMode, SettleDelays, SnapshotConfig};
pub use engine::SnapshotEngine;
pub use error::{SnapshotError, SnapshotResult};
pub use events::{BroadcastSink, EventSink, NoopSink, SnapshotEvent};
pub use git::{GitExecutor, ProcessGit, Repository};
pub use lock::LockRegistry;
pub use metadata::MetadataStore;
pub use prune::select_evictions;
pub use snapshot::{
    message_for, parse_tag, tag_for, MetadataIndex, Snapshot, MAX_VERSION, TAG_PREFIX,
};
pub use status::RepoStatus;
pub use trigger::{InputTrigger, TriggerOutcome};

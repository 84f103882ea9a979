//! Snapshot lifecycle events.
//!
//! The engine reports what it did through an [`EventSink`]. Emission is
//! fire-and-forget and purely observational: a sink can never fail or slow
//! down a snapshot operation.

use crate::Snapshot;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;

/// Default channel capacity.
const DEFAULT_CAPACITY: usize = 256;

/// Something the engine did to a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SnapshotEvent {
    /// A new snapshot was committed and tagged.
    Created { project: PathBuf, snapshot: Snapshot },
    /// The working tree was reset to a snapshot.
    Restored { project: PathBuf, version: u32 },
    /// Snapshots were pruned or deleted.
    Cleanup { project: PathBuf, removed: Vec<u32> },
}

impl SnapshotEvent {
    /// Event type name for serialization/logging.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Created { .. } => "snapshot.created",
            Self::Restored { .. } => "snapshot.restored",
            Self::Cleanup { .. } => "snapshot.cleanup",
        }
    }

    /// Project the event concerns.
    pub fn project(&self) -> &Path {
        match self {
            Self::Created { project, .. }
            | Self::Restored { project, .. }
            | Self::Cleanup { project, .. } => project,
        }
    }
}

/// Receives engine events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SnapshotEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: SnapshotEvent) {}
}

/// Fans events out to any number of subscribers.
///
/// Emitting with no subscribers is fine; slow subscribers lag and miss
/// events rather than blocking the engine.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    sender: broadcast::Sender<SnapshotEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to all events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<SnapshotEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventSink for BroadcastSink {
    fn emit(&self, event: SnapshotEvent) {
        tracing::trace!(event = event.event_type(), "Emitting snapshot event");
        // Ignore send errors (no receivers)
        let _ = self.sender.send(event);
    }
}

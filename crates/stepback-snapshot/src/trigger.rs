//! Snapshot-on-submit hook for interactive sessions.
//!
//! The session layer calls [`InputTrigger::before_forward`] with each chunk
//! of input before handing it to the agent. When the chunk submits a line,
//! a snapshot is started and given a bounded head start; the input is then
//! let through whatever the snapshot's fate. Failures never reach the
//! session.

use crate::{Snapshot, SnapshotEngine};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// What the trigger did with one chunk of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Input did not submit a line, or auto snapshots are off.
    Skipped,
    /// A snapshot was created.
    Created(Snapshot),
    /// Nothing to snapshot (clean tree or operation in progress).
    Unchanged,
    /// The snapshot is still running in the background.
    Pending,
    /// The snapshot failed; details were logged.
    Failed,
}

/// Creates a snapshot of one project whenever input is submitted.
#[derive(Debug, Clone)]
pub struct InputTrigger {
    engine: Arc<SnapshotEngine>,
    project: PathBuf,
}

impl InputTrigger {
    pub fn new(engine: Arc<SnapshotEngine>, project: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            project: project.into(),
        }
    }

    /// Whether a chunk of input submits a line.
    pub fn submits_line(input: &[u8]) -> bool {
        input.iter().any(|b| matches!(b, b'\n' | b'\r'))
    }

    /// Call before forwarding `input`.
    ///
    /// Waits at most the configured trigger wait; a snapshot that takes
    /// longer keeps running on its own task.
    pub async fn before_forward(&self, input: &[u8]) -> TriggerOutcome {
        let config = self.engine.config();
        if !config.enabled || !config.auto_snapshot || !Self::submits_line(input) {
            return TriggerOutcome::Skipped;
        }

        let engine = Arc::clone(&self.engine);
        let project = self.project.clone();
        let mut task = tokio::spawn(async move { engine.create_snapshot(&project).await });

        match tokio::time::timeout(config.trigger_wait(), &mut task).await {
            Ok(Ok(Ok(Some(snapshot)))) => TriggerOutcome::Created(snapshot),
            Ok(Ok(Ok(None))) => TriggerOutcome::Unchanged,
            Ok(Ok(Err(e))) => {
                warn!(project = %self.project.display(), error = %e, "Automatic snapshot failed");
                TriggerOutcome::Failed
            }
            Ok(Err(e)) => {
                warn!(project = %self.project.display(), error = %e, "Automatic snapshot task aborted");
                TriggerOutcome::Failed
            }
            Err(_) => {
                debug!(
                    project = %self.project.display(),
                    "Snapshot still running; forwarding input"
                );
                TriggerOutcome::Pending
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::GitExecutor;
    use crate::{SnapshotConfig, SnapshotResult};
    use async_trait::async_trait;
    use std::path::Path;
    use std::time::Duration;

    /// Executor whose commands never finish in time.
    struct StalledGit;

    #[async_trait]
    impl GitExecutor for StalledGit {
        async fn exec(&self, _dir: &Path, _args: &[&str]) -> SnapshotResult<String> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(String::new())
        }

        async fn exec_background(&self, _dir: &Path, _args: &[&str]) {}
    }

    /// Executor whose commands always fail.
    struct BrokenGit;

    #[async_trait]
    impl GitExecutor for BrokenGit {
        async fn exec(&self, _dir: &Path, args: &[&str]) -> SnapshotResult<String> {
            Err(crate::SnapshotError::command(args, Some(128), "fatal: broken"))
        }

        async fn exec_background(&self, _dir: &Path, _args: &[&str]) {}
    }

    fn engine(git: Arc<dyn GitExecutor>, wait_ms: u64) -> Arc<SnapshotEngine> {
        let config = SnapshotConfig {
            trigger_wait_ms: wait_ms,
            ..Default::default()
        };
        Arc::new(SnapshotEngine::new(config).with_executor(git))
    }

    #[test]
    fn test_submits_line() {
        assert!(InputTrigger::submits_line(b"ls\n"));
        assert!(InputTrigger::submits_line(b"\r"));
        assert!(!InputTrigger::submits_line(b"partial input"));
        assert!(!InputTrigger::submits_line(b""));
    }

    #[tokio::test]
    async fn test_partial_input_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let trigger = InputTrigger::new(engine(Arc::new(BrokenGit), 100), dir.path());

        assert_eq!(trigger.before_forward(b"abc").await, TriggerOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_disabled_auto_snapshot_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = SnapshotConfig {
            auto_snapshot: false,
            ..Default::default()
        };
        let engine = Arc::new(SnapshotEngine::new(config).with_executor(Arc::new(BrokenGit)));
        let trigger = InputTrigger::new(engine, dir.path());

        assert_eq!(trigger.before_forward(b"go\n").await, TriggerOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_slow_snapshot_does_not_block_input() {
        let dir = tempfile::tempdir().unwrap();
        let trigger = InputTrigger::new(engine(Arc::new(StalledGit), 50), dir.path());

        let started = std::time::Instant::now();
        let outcome = trigger.before_forward(b"go\n").await;

        assert_eq!(outcome, TriggerOutcome::Pending);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_failure_is_absorbed() {
        let dir = tempfile::tempdir().unwrap();
        let trigger = InputTrigger::new(engine(Arc::new(BrokenGit), 1_000), dir.path());

        assert_eq!(trigger.before_forward(b"go\n").await, TriggerOutcome::Failed);
    }
}

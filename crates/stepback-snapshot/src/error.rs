//! Snapshot error types.

use stepback_storage::StorageError;
use thiserror::Error;

/// Result type for snapshot operations.
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Errors that can occur during snapshot operations.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// A timed git command did not finish in time.
    #[error("git {args} timed out after {timeout_ms}ms")]
    CommandTimeout { args: String, timeout_ms: u64 },

    /// A git command exited unsuccessfully.
    #[error("git {args} failed (exit code {code:?}): {stderr}")]
    CommandError {
        args: String,
        code: Option<i32>,
        stderr: String,
    },

    /// No catalogued snapshot has this version.
    #[error("Snapshot not found: version {0}")]
    NotFound(u32),

    /// The snapshot's tag no longer resolves to a commit.
    #[error("Tag {0} no longer points at a commit")]
    TagMissing(String),

    /// Restore refused because the working tree has pending changes.
    #[error(
        "Working tree has {} uncommitted change(s); restore with force to discard them",
        .files.len()
    )]
    UncommittedChanges { files: Vec<String> },

    /// Every snapshot version has been handed out.
    #[error("No snapshot versions left (next would be {0})")]
    VersionsExhausted(u32),

    /// Metadata index storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be loaded.
    #[error("Invalid configuration in {path}: {message}")]
    Config { path: String, message: String },
}

impl SnapshotError {
    /// Create a command error from the pieces of a failed invocation.
    pub fn command(args: &[&str], code: Option<i32>, stderr: impl Into<String>) -> Self {
        Self::CommandError {
            args: args.join(" "),
            code,
            stderr: stderr.into().trim().to_string(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(args: &[&str], timeout_ms: u64) -> Self {
        Self::CommandTimeout {
            args: args.join(" "),
            timeout_ms,
        }
    }

    /// Whether the caller can retry the failed restore with `force`.
    pub fn is_uncommitted_changes(&self) -> bool {
        matches!(self, Self::UncommittedChanges { .. })
    }

    /// Whether this error came from the git command itself exiting non-zero.
    pub fn is_command_error(&self) -> bool {
        matches!(self, Self::CommandError { .. })
    }

    /// Whether this error is a command timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::CommandTimeout { .. })
    }
}

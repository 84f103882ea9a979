//! Repository status view.
//!
//! Parsed from `git status --porcelain=v1 -z --untracked-files=all`. Only
//! ever used as a precondition gate; nothing here mutates the repository.

use serde::{Deserialize, Serialize};

/// Read-only view of a project's repository state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoStatus {
    /// Whether the project directory has its own repository.
    pub is_repository: bool,

    /// Checked-out branch, or `HEAD` when detached.
    pub current_branch: String,

    /// Whether anything is staged, modified or untracked.
    pub has_uncommitted_changes: bool,

    pub untracked_files: Vec<String>,
    pub modified_files: Vec<String>,
    pub staged_files: Vec<String>,

    /// A rebase is stopped part-way.
    pub is_rebasing: bool,

    /// A merge is waiting to be concluded.
    pub is_merging: bool,
}

impl RepoStatus {
    /// Status of a directory without a repository.
    pub fn missing() -> Self {
        Self::default()
    }

    /// Every path with a pending change, deduplicated, in first-seen order.
    pub fn pending_files(&self) -> Vec<String> {
        let mut files: Vec<String> = Vec::new();
        for path in self
            .staged_files
            .iter()
            .chain(&self.modified_files)
            .chain(&self.untracked_files)
        {
            if !files.contains(path) {
                files.push(path.clone());
            }
        }
        files
    }

    /// Whether a rebase or merge is in progress.
    pub fn operation_in_progress(&self) -> bool {
        self.is_rebasing || self.is_merging
    }
}

/// File lists extracted from porcelain output.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PorcelainEntries {
    pub untracked: Vec<String>,
    pub modified: Vec<String>,
    pub staged: Vec<String>,
}

impl PorcelainEntries {
    pub fn is_empty(&self) -> bool {
        self.untracked.is_empty() && self.modified.is_empty() && self.staged.is_empty()
    }
}

/// Parse NUL-separated porcelain v1 output.
///
/// Each record is `XY <path>`; renames and copies are followed by an extra
/// record holding the original path, which is skipped. `X` is the index
/// column, `Y` the worktree column.
pub fn parse_porcelain(output: &str) -> PorcelainEntries {
    let mut entries = PorcelainEntries::default();
    let mut records = output.split('\0').filter(|r| !r.is_empty());

    while let Some(record) = records.next() {
        let bytes = record.as_bytes();
        if bytes.len() < 4 || bytes[2] != b' ' {
            continue;
        }
        let (x, y) = (bytes[0], bytes[1]);
        let path = record[3..].to_string();

        if matches!(x, b'R' | b'C') {
            records.next();
        }

        match (x, y) {
            (b'?', b'?') => entries.untracked.push(path),
            (b'!', b'!') => {}
            _ => {
                if x != b' ' {
                    entries.staged.push(path.clone());
                }
                if y != b' ' {
                    entries.modified.push(path);
                }
            }
        }
    }

    entries
}

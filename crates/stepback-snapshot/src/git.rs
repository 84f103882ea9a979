//! Git command execution.
//!
//! All version-control work is delegated to the `git` binary. The
//! [`GitExecutor`] trait is the seam: [`ProcessGit`] runs real processes,
//! tests substitute their own implementations. [`Repository`] layers the
//! handful of typed operations the engine needs on top of an executor.

use crate::snapshot::TAG_GLOB;
use crate::status::{parse_porcelain, RepoStatus};
use crate::{SnapshotError, SnapshotResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Default bound for timed git calls.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs git subcommands inside a project directory.
#[async_trait]
pub trait GitExecutor: Send + Sync {
    /// Run a command and wait for it, bounded by a timeout.
    ///
    /// Returns stdout on success. Fails with
    /// [`SnapshotError::CommandTimeout`] or [`SnapshotError::CommandError`].
    async fn exec(&self, dir: &Path, args: &[&str]) -> SnapshotResult<String>;

    /// Start a command without waiting for it to finish.
    ///
    /// Failures are logged, never returned.
    async fn exec_background(&self, dir: &Path, args: &[&str]);
}

/// [`GitExecutor`] backed by `tokio::process`.
#[derive(Debug, Clone)]
pub struct ProcessGit {
    program: PathBuf,
    timeout: Duration,
}

impl Default for ProcessGit {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

impl ProcessGit {
    /// Run the `git` found on `PATH` with the given timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: PathBuf::from("git"),
            timeout,
        }
    }

    /// Use a different binary (a specific git install, or a stand-in for tests).
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self, dir: &Path, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            // Never block on credential or editor prompts.
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_EDITOR", "true")
            // Status must not take index.lock away from concurrent git users.
            .env("GIT_OPTIONAL_LOCKS", "0");
        cmd
    }
}

#[async_trait]
impl GitExecutor for ProcessGit {
    async fn exec(&self, dir: &Path, args: &[&str]) -> SnapshotResult<String> {
        debug!(dir = %dir.display(), args = ?args, "git");

        let mut cmd = self.command(dir, args);
        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn()?;
        let timeout_ms = self.timeout.as_millis() as u64;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) if output.status.success() => {
                Ok(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Ok(Ok(output)) => Err(SnapshotError::command(
                args,
                output.status.code(),
                String::from_utf8_lossy(&output.stderr),
            )),
            Ok(Err(e)) => Err(SnapshotError::Io(e)),
            // Dropping the wait future drops the child, which kills it.
            Err(_) => Err(SnapshotError::timeout(args, timeout_ms)),
        }
    }

    async fn exec_background(&self, dir: &Path, args: &[&str]) {
        debug!(dir = %dir.display(), args = ?args, "git (background)");

        let mut cmd = self.command(dir, args);
        cmd.stdout(Stdio::null()).stderr(Stdio::piped());

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(args = ?args, error = %e, "Failed to start background git command");
                return;
            }
        };

        let joined = args.join(" ");
        tokio::spawn(async move {
            match child.wait_with_output().await {
                Ok(output) if output.status.success() => {
                    debug!(args = %joined, "Background git command finished");
                }
                Ok(output) => warn!(
                    args = %joined,
                    code = ?output.status.code(),
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "Background git command failed"
                ),
                Err(e) => warn!(args = %joined, error = %e, "Background git command errored"),
            }
        });
    }
}

/// Typed git operations for one project directory.
#[derive(Clone)]
pub struct Repository {
    git: Arc<dyn GitExecutor>,
    dir: PathBuf,
}

impl Repository {
    pub fn new(git: Arc<dyn GitExecutor>, dir: impl Into<PathBuf>) -> Self {
        Self {
            git,
            dir: dir.into(),
        }
    }

    /// The project directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The underlying executor.
    pub fn executor(&self) -> &Arc<dyn GitExecutor> {
        &self.git
    }

    /// Run a timed git command in the project directory.
    pub async fn run(&self, args: &[&str]) -> SnapshotResult<String> {
        self.git.exec(&self.dir, args).await
    }

    /// Start a git command in the project directory without waiting.
    pub async fn run_background(&self, args: &[&str]) {
        self.git.exec_background(&self.dir, args).await
    }

    /// Whether the project directory has its own repository.
    ///
    /// A repository in a parent directory does not count; snapshots must
    /// never land in someone else's history.
    pub fn is_repository(&self) -> bool {
        self.dir.join(".git").exists()
    }

    /// Create the repository with a default ignore list and make sure
    /// commits can be authored.
    pub async fn init(&self, default_ignore: &[String]) -> SnapshotResult<()> {
        self.run(&["init", "-q"]).await?;

        let gitignore = self.dir.join(".gitignore");
        if !default_ignore.is_empty() && !tokio::fs::try_exists(&gitignore).await? {
            let mut content = default_ignore.join("\n");
            content.push('\n');
            tokio::fs::write(&gitignore, content).await?;
        }

        self.ensure_identity().await
    }

    /// Configure a repository-local author when none is configured anywhere.
    async fn ensure_identity(&self) -> SnapshotResult<()> {
        for (key, fallback) in [("user.name", "stepback"), ("user.email", "stepback@localhost")] {
            match self.run(&["config", "--get", key]).await {
                Ok(value) if !value.trim().is_empty() => {}
                Ok(_) | Err(SnapshotError::CommandError { .. }) => {
                    debug!(key, fallback, "Configuring repository-local identity");
                    self.run(&["config", key, fallback]).await?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Absolute path of the git directory.
    pub async fn git_dir(&self) -> SnapshotResult<PathBuf> {
        let out = self.run(&["rev-parse", "--git-dir"]).await?;
        let path = PathBuf::from(out.trim());
        Ok(if path.is_absolute() {
            path
        } else {
            self.dir.join(path)
        })
    }

    /// Keep a project-relative directory out of status and commits via
    /// `info/exclude`, leaving the user's `.gitignore` untouched.
    pub async fn ensure_excluded(&self, dir_name: &str) -> SnapshotResult<()> {
        let exclude = self.git_dir().await?.join("info").join("exclude");
        let pattern = format!("/{}/", dir_name.trim_matches('/'));

        let existing = match tokio::fs::read_to_string(&exclude).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        if existing.lines().any(|line| line.trim() == pattern) {
            return Ok(());
        }

        if let Some(parent) = exclude.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut content = existing;
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str(&pattern);
        content.push('\n');
        tokio::fs::write(&exclude, content).await?;
        debug!(pattern = %pattern, "Added stepback directory to info/exclude");
        Ok(())
    }

    /// Current repository status.
    pub async fn status(&self) -> SnapshotResult<RepoStatus> {
        if !self.is_repository() {
            return Ok(RepoStatus::missing());
        }

        let porcelain = self
            .run(&["status", "--porcelain=v1", "-z", "--untracked-files=all"])
            .await?;
        let entries = parse_porcelain(&porcelain);

        let current_branch = match self.run(&["symbolic-ref", "--short", "-q", "HEAD"]).await {
            Ok(branch) => branch.trim().to_string(),
            Err(SnapshotError::CommandError { .. }) => "HEAD".to_string(),
            Err(e) => return Err(e),
        };

        let git_dir = self.git_dir().await?;
        let is_rebasing =
            git_dir.join("rebase-merge").exists() || git_dir.join("rebase-apply").exists();
        let is_merging = git_dir.join("MERGE_HEAD").exists();

        Ok(RepoStatus {
            is_repository: true,
            current_branch,
            has_uncommitted_changes: !entries.is_empty(),
            untracked_files: entries.untracked,
            modified_files: entries.modified,
            staged_files: entries.staged,
            is_rebasing,
            is_merging,
        })
    }

    /// Resolve a revision to a commit id, `None` when it does not resolve.
    pub async fn resolve_commit(&self, rev: &str) -> SnapshotResult<Option<String>> {
        let target = format!("{rev}^{{commit}}");
        match self.run(&["rev-parse", "--verify", "-q", target.as_str()]).await {
            Ok(out) => {
                let id = out.trim();
                Ok((!id.is_empty()).then(|| id.to_string()))
            }
            Err(SnapshotError::CommandError { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Names of all tags matching the snapshot pattern.
    pub async fn snapshot_tags(&self) -> SnapshotResult<Vec<String>> {
        let out = self.run(&["tag", "--list", TAG_GLOB]).await?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Paths touched by a commit, relative to the project root.
    ///
    /// Root commits are diffed against the empty tree.
    pub async fn changed_files(&self, commit: &str) -> SnapshotResult<Vec<String>> {
        let out = self
            .run(&[
                "diff-tree",
                "--no-commit-id",
                "--name-only",
                "-r",
                "--root",
                "-z",
                commit,
            ])
            .await?;
        Ok(out
            .split('\0')
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Committer time (epoch millis) and subject line of a commit.
    pub async fn commit_info(&self, commit: &str) -> SnapshotResult<(i64, String)> {
        let out = self
            .run(&["log", "-1", "--format=%ct%x00%s", commit])
            .await?;
        let line = out.trim_end_matches('\n');
        let (time, subject) = line.split_once('\0').unwrap_or((line, ""));
        let seconds: i64 = time.trim().parse().unwrap_or_default();
        Ok((seconds * 1000, subject.to_string()))
    }

    pub async fn stage_all(&self) -> SnapshotResult<()> {
        self.run(STAGE_ARGS).await.map(drop)
    }

    pub async fn commit(&self, message: &str) -> SnapshotResult<()> {
        self.run(&commit_args(message)).await.map(drop)
    }

    pub async fn tag(&self, name: &str) -> SnapshotResult<()> {
        self.run(&["tag", name]).await.map(drop)
    }

    pub async fn delete_tag(&self, name: &str) -> SnapshotResult<()> {
        self.run(&["tag", "-d", name]).await.map(drop)
    }

    /// Point the checked-out branch and working tree at a commit.
    pub async fn reset_hard(&self, commit: &str) -> SnapshotResult<()> {
        self.run(&["reset", "--hard", "-q", commit]).await.map(drop)
    }

    /// Remove untracked files and directories. Ignored paths are kept.
    pub async fn clean(&self) -> SnapshotResult<()> {
        self.run(&["clean", "-fd", "-q"]).await.map(drop)
    }

    /// Unified diff of the working tree against a commit.
    pub async fn diff_against(&self, commit: &str) -> SnapshotResult<String> {
        self.run(&["diff", "--no-color", commit, "--"]).await
    }
}

/// Arguments for staging everything.
pub(crate) const STAGE_ARGS: &[&str] = &["add", "-A"];

/// Arguments for a snapshot commit.
pub(crate) fn commit_args(message: &str) -> [&str; 5] {
    ["commit", "-q", "--no-gpg-sign", "-m", message]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_args() {
        let args = commit_args("Snapshot V1");
        assert_eq!(args[0], "commit");
        assert_eq!(args[4], "Snapshot V1");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exec_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let git = ProcessGit::new(Duration::from_millis(100)).with_program("sleep");

        let err = git.exec(dir.path(), &["5"]).await.unwrap_err();
        assert!(err.is_timeout(), "{err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exec_reports_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let git = ProcessGit::default().with_program("false");

        match git.exec(dir.path(), &[]).await {
            Err(SnapshotError::CommandError { code, .. }) => assert_eq!(code, Some(1)),
            other => panic!("expected command error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exec_returns_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let git = ProcessGit::default().with_program("echo");

        let out = git.exec(dir.path(), &["hello"]).await.unwrap();
        assert_eq!(out, "hello\n");
    }

    #[tokio::test]
    async fn test_missing_binary_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let git = ProcessGit::default().with_program("stepback-no-such-binary");

        let err = git.exec(dir.path(), &["status"]).await.unwrap_err();
        assert!(matches!(err, SnapshotError::Io(_)));
    }

    #[tokio::test]
    async fn test_repository_detection_requires_own_git_dir() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::new(Arc::new(ProcessGit::default()), dir.path());
        assert!(!repo.is_repository());

        std::fs::create_dir(dir.path().join(".git")).unwrap();
        assert!(repo.is_repository());
    }
}

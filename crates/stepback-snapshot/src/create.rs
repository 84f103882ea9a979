//! Snapshot creation: stage, commit, tag, record.

use crate::config::ExecutionMode;
use crate::engine::Project;
use crate::events::SnapshotEvent;
use crate::git::{commit_args, STAGE_ARGS};
use crate::snapshot::{message_for, tag_for, MAX_VERSION};
use crate::{catalog, prune, Snapshot, SnapshotError, SnapshotResult};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Create a snapshot of everything pending in the project.
///
/// Returns `None` without touching history when there is nothing to
/// snapshot or a rebase/merge is in progress.
pub(crate) async fn create_snapshot(project: &Project<'_>) -> SnapshotResult<Option<Snapshot>> {
    let config = project.config;
    if !config.enabled {
        debug!("Snapshots are disabled");
        return Ok(None);
    }

    let repo = &project.repo;
    if !repo.is_repository() {
        info!(project = %project.path.display(), "Initializing repository for snapshots");
        repo.init(&config.default_ignore).await?;
    }
    project.exclude_private_dirs().await?;

    let status = repo.status().await?;
    if status.operation_in_progress() {
        info!(
            rebasing = status.is_rebasing,
            merging = status.is_merging,
            "Skipping snapshot while an operation is in progress"
        );
        return Ok(None);
    }
    if !status.has_uncommitted_changes {
        debug!("Nothing to snapshot");
        return Ok(None);
    }

    // Reconcile first so tags the index missed are never reused.
    let mut index = catalog::load_reconciled(project).await?;
    let version = index.next_version;
    if version >= MAX_VERSION {
        return Err(SnapshotError::VersionsExhausted(version));
    }
    let tag = tag_for(version);
    let message = message_for(version);

    match config.execution {
        ExecutionMode::Confirmed => {
            repo.stage_all().await?;
            repo.commit(&message).await?;
            repo.tag(&tag).await?;
        }
        ExecutionMode::Background => {
            let settle = &config.settle;
            repo.run_background(STAGE_ARGS).await;
            tokio::time::sleep(Duration::from_millis(settle.stage_ms)).await;
            repo.run_background(&commit_args(&message)).await;
            tokio::time::sleep(Duration::from_millis(settle.commit_ms)).await;
            repo.run_background(&["tag", tag.as_str()]).await;
            tokio::time::sleep(Duration::from_millis(settle.tag_ms)).await;
        }
    }

    let commit_ref = match repo.resolve_commit(&tag).await? {
        Some(commit) => commit,
        None => {
            // Only reachable when a background tag has not landed yet.
            warn!(tag = %tag, "Snapshot tag not visible yet; recording HEAD");
            repo.resolve_commit("HEAD")
                .await?
                .ok_or_else(|| SnapshotError::TagMissing(tag.clone()))?
        }
    };

    let files_changed = match repo.changed_files(&commit_ref).await {
        Ok(files) => files,
        Err(e) => {
            warn!(commit = %commit_ref, error = %e, "Could not list changed files");
            Vec::new()
        }
    };

    let snapshot = Snapshot::new(version, commit_ref, files_changed);
    index.record(snapshot.clone());

    let cap = config.max_snapshots;
    let removed = if cap > 0 && index.len() > cap {
        prune::evict(project, &mut index, cap).await?
    } else {
        Vec::new()
    };

    project.store.save(&index).await?;

    info!(
        project = %project.path.display(),
        version,
        commit = %snapshot.short_ref(),
        files = snapshot.files_changed.len(),
        "Created snapshot"
    );

    project.events.emit(SnapshotEvent::Created {
        project: project.path.to_path_buf(),
        snapshot: snapshot.clone(),
    });
    if !removed.is_empty() {
        project.events.emit(SnapshotEvent::Cleanup {
            project: project.path.to_path_buf(),
            removed,
        });
    }

    Ok(Some(snapshot))
}

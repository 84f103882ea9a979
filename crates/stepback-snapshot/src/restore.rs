//! Restoring the working tree to a snapshot.

use crate::engine::Project;
use crate::events::SnapshotEvent;
use crate::{catalog, MetadataIndex, Snapshot, SnapshotError, SnapshotResult};
use tracing::{info, warn};

/// Find a snapshot, reconciling only when the stored index lacks it.
///
/// Returns the index the snapshot was found in so callers can update and
/// persist it.
pub(crate) async fn locate(
    project: &Project<'_>,
    version: u32,
) -> SnapshotResult<(MetadataIndex, Snapshot)> {
    if !project.repo.is_repository() {
        return Err(SnapshotError::NotFound(version));
    }
    project.exclude_private_dirs().await?;

    let stored = project.store.load().await?;
    if stored.is_consistent() {
        if let Some(snapshot) = stored.get(version).cloned() {
            return Ok((stored, snapshot));
        }
    }

    let index = catalog::load_reconciled(project).await?;
    match index.get(version).cloned() {
        Some(snapshot) => Ok((index, snapshot)),
        None => Err(SnapshotError::NotFound(version)),
    }
}

/// Reset the working tree to a snapshot.
///
/// Without `force`, refuses when anything is pending so no work is lost.
/// With `force`, pending changes (untracked files included) are discarded.
pub(crate) async fn restore_snapshot(
    project: &Project<'_>,
    version: u32,
    force: bool,
) -> SnapshotResult<Snapshot> {
    let repo = &project.repo;
    let (mut index, snapshot) = locate(project, version).await?;

    let commit = repo
        .resolve_commit(&snapshot.tag)
        .await?
        .ok_or_else(|| SnapshotError::TagMissing(snapshot.tag.clone()))?;

    if !force {
        let status = repo.status().await?;
        if status.has_uncommitted_changes {
            let files = status.pending_files();
            warn!(
                version,
                pending = files.len(),
                "Refusing to restore over uncommitted changes"
            );
            return Err(SnapshotError::UncommittedChanges { files });
        }
    }

    if commit != snapshot.commit_ref {
        warn!(
            tag = %snapshot.tag,
            recorded = %snapshot.commit_ref,
            actual = %commit,
            "Snapshot tag moved since it was recorded; following the tag"
        );
    }

    repo.reset_hard(&commit).await?;
    if force {
        repo.clean().await?;
    }

    index.current_version = Some(version);
    project.store.save(&index).await?;

    info!(
        project = %project.path.display(),
        version,
        force,
        "Restored snapshot"
    );
    project.events.emit(SnapshotEvent::Restored {
        project: project.path.to_path_buf(),
        version,
    });

    Ok(snapshot)
}

/// Diff of the working tree against a snapshot.
pub(crate) async fn diff_snapshot(project: &Project<'_>, version: u32) -> SnapshotResult<String> {
    let (_, snapshot) = locate(project, version).await?;
    let commit = project
        .repo
        .resolve_commit(&snapshot.tag)
        .await?
        .ok_or_else(|| SnapshotError::TagMissing(snapshot.tag.clone()))?;
    project.repo.diff_against(&commit).await
}

//! Retention: pruning old snapshots and deleting single ones.
//!
//! Removing a snapshot deletes its tag and its index entry. The commit
//! stays in history; only the label and the fast-path record go.

use crate::engine::Project;
use crate::events::SnapshotEvent;
use crate::restore::locate;
use crate::snapshot::tag_for;
use crate::{catalog, MetadataIndex, Snapshot, SnapshotError, SnapshotResult};
use tracing::{info, warn};

/// Versions to evict so only the `keep_last` highest remain.
pub fn select_evictions(index: &MetadataIndex, keep_last: usize) -> Vec<u32> {
    let mut versions = index.versions();
    versions.sort_unstable();
    let excess = versions.len().saturating_sub(keep_last);
    versions.truncate(excess);
    versions
}

/// Delete one snapshot tag. A tag that is already gone is not an error.
async fn delete_tag(project: &Project<'_>, version: u32) -> SnapshotResult<()> {
    let tag = tag_for(version);
    match project.repo.delete_tag(&tag).await {
        Ok(()) => Ok(()),
        Err(SnapshotError::CommandError { stderr, .. }) => {
            warn!(tag = %tag, stderr = %stderr, "Could not delete snapshot tag");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Evict everything beyond `keep_last` from `index`, deleting tags.
///
/// The caller persists the index. Returns the evicted versions.
pub(crate) async fn evict(
    project: &Project<'_>,
    index: &mut MetadataIndex,
    keep_last: usize,
) -> SnapshotResult<Vec<u32>> {
    let evicted = select_evictions(index, keep_last);
    for version in &evicted {
        delete_tag(project, *version).await?;
    }
    index.remove(&evicted);

    if let Some(current) = index.current_version {
        if evicted.contains(&current) {
            // Commit and working tree are untouched; only the label is gone.
            warn!(
                version = current,
                "Pruned the snapshot the working tree was restored to"
            );
        }
    }

    Ok(evicted)
}

/// Keep the `keep_last` newest snapshots and remove the rest.
///
/// Returns how many were removed.
pub(crate) async fn prune_snapshots(project: &Project<'_>, keep_last: usize) -> SnapshotResult<usize> {
    if !project.repo.is_repository() {
        return Ok(0);
    }

    let mut index = catalog::load_reconciled(project).await?;
    let removed = evict(project, &mut index, keep_last).await?;
    if removed.is_empty() {
        return Ok(0);
    }

    project.store.save(&index).await?;
    info!(
        project = %project.path.display(),
        removed = removed.len(),
        kept = index.len(),
        "Pruned snapshots"
    );

    let count = removed.len();
    project.events.emit(SnapshotEvent::Cleanup {
        project: project.path.to_path_buf(),
        removed,
    });
    Ok(count)
}

/// Remove a single snapshot.
pub(crate) async fn delete_snapshot(project: &Project<'_>, version: u32) -> SnapshotResult<Snapshot> {
    let (mut index, snapshot) = locate(project, version).await?;

    delete_tag(project, version).await?;
    index.remove(&[version]);
    if index.current_version == Some(version) {
        index.current_version = None;
    }
    project.store.save(&index).await?;

    info!(project = %project.path.display(), version, "Deleted snapshot");
    project.events.emit(SnapshotEvent::Cleanup {
        project: project.path.to_path_buf(),
        removed: vec![version],
    });
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_of(versions: &[u32]) -> MetadataIndex {
        let mut index = MetadataIndex::default();
        for v in versions {
            index.record(Snapshot::new(*v, "c", vec![]));
        }
        index
    }

    #[test]
    fn test_select_lowest_versions() {
        let index = index_of(&[1, 2, 3, 4, 5]);
        assert_eq!(select_evictions(&index, 2), vec![1, 2, 3]);
    }

    #[test]
    fn test_select_nothing_under_cap() {
        let index = index_of(&[1, 2]);
        assert!(select_evictions(&index, 2).is_empty());
        assert!(select_evictions(&index, 10).is_empty());
    }

    #[test]
    fn test_select_everything_with_zero_keep() {
        let index = index_of(&[3, 7]);
        assert_eq!(select_evictions(&index, 0), vec![3, 7]);
    }

    #[test]
    fn test_select_with_gaps() {
        let index = index_of(&[2, 5, 9, 10]);
        assert_eq!(select_evictions(&index, 3), vec![2]);
    }
}

//! Snapshot catalog and reconciliation.
//!
//! Tags are the durable record of which snapshots exist; the metadata
//! index is a cache that can drift (a crash between tagging and saving, an
//! index deleted by hand, tags removed outside stepback). Listing compares
//! the two and repairs the index.
//!
//! The comparison itself is the pure [`reconcile`] function. The async
//! half only gathers inputs: discovered tag versions and records rebuilt
//! from git for tags the index does not know.

use crate::engine::Project;
use crate::snapshot::{parse_tag, tag_for};
use crate::{MetadataIndex, RepoStatus, Snapshot, SnapshotResult};
use tracing::{debug, info, warn};

/// Result of merging the stored index with discovered tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// The repaired index.
    pub index: MetadataIndex,
    /// Whether it differs from what was stored and must be persisted.
    pub dirty: bool,
    /// Versions rebuilt from git.
    pub recovered: Vec<u32>,
    /// Stored versions with no tag left.
    pub dropped: Vec<u32>,
}

/// Tag versions the stored index has no record for.
pub fn missing_versions(stored: &MetadataIndex, tags: &[u32]) -> Vec<u32> {
    tags.iter()
        .copied()
        .filter(|v| !stored.snapshots.iter().any(|s| s.version == *v))
        .collect()
}

/// Merge the stored index with the versions found as tags.
///
/// `tags` need not be sorted. `recovered` holds rebuilt records for
/// versions from [`missing_versions`]; a tag with neither a stored nor a
/// recovered record is left out.
pub fn reconcile(stored: &MetadataIndex, tags: &[u32], recovered: Vec<Snapshot>) -> Reconciliation {
    let mut versions = tags.to_vec();
    versions.sort_unstable();
    versions.dedup();

    let mut snapshots = Vec::with_capacity(versions.len());
    let mut recovered_versions = Vec::new();

    for version in &versions {
        if let Some(existing) = stored.snapshots.iter().find(|s| s.version == *version) {
            snapshots.push(existing.clone());
        } else if let Some(rebuilt) = recovered.iter().find(|s| s.version == *version) {
            snapshots.push(rebuilt.clone());
            recovered_versions.push(*version);
        }
    }

    let dropped: Vec<u32> = stored
        .snapshots
        .iter()
        .map(|s| s.version)
        .filter(|v| !versions.contains(v))
        .collect();

    let positional_mismatch = snapshots.len() != stored.snapshots.len()
        || snapshots
            .iter()
            .zip(&stored.snapshots)
            .any(|(a, b)| a.version != b.version);

    let floor = snapshots.last().map_or(1, |s| s.version.saturating_add(1));
    let counter_behind = stored.next_version < floor;
    let dirty = positional_mismatch || counter_behind;

    let next_version = if dirty {
        // Never hand out a version again, even one whose tag is gone.
        stored.next_version.max(floor)
    } else {
        stored.next_version
    };

    Reconciliation {
        index: MetadataIndex {
            snapshots,
            next_version,
            current_version: stored.current_version,
        },
        dirty,
        recovered: recovered_versions,
        dropped,
    }
}

/// Versions of every well-formed snapshot tag, ascending.
pub(crate) async fn discover_versions(project: &Project<'_>) -> SnapshotResult<Vec<u32>> {
    let mut versions: Vec<u32> = project
        .repo
        .snapshot_tags()
        .await?
        .iter()
        .filter_map(|tag| parse_tag(tag))
        .collect();
    versions.sort_unstable();
    versions.dedup();
    Ok(versions)
}

/// Rebuild a snapshot record from its tag's commit.
///
/// Returns `None` when the tag does not resolve to a commit.
pub(crate) async fn recover_snapshot(
    project: &Project<'_>,
    version: u32,
) -> SnapshotResult<Option<Snapshot>> {
    let tag = tag_for(version);
    let Some(commit_ref) = project.repo.resolve_commit(&tag).await? else {
        warn!(tag = %tag, "Snapshot tag does not resolve to a commit");
        return Ok(None);
    };

    let (timestamp, message) = project.repo.commit_info(&commit_ref).await?;
    let files_changed = project.repo.changed_files(&commit_ref).await?;

    Ok(Some(Snapshot {
        version,
        commit_ref,
        tag,
        timestamp,
        message,
        files_changed,
    }))
}

/// Load the index and bring it in line with the tags, persisting repairs.
///
/// Never deletes tags or commits.
pub(crate) async fn load_reconciled(project: &Project<'_>) -> SnapshotResult<MetadataIndex> {
    let stored = project.store.load().await?;
    if !project.repo.is_repository() {
        return Ok(stored);
    }
    project.exclude_private_dirs().await?;

    let tags = discover_versions(project).await?;

    let mut recovered = Vec::new();
    for version in missing_versions(&stored, &tags) {
        if let Some(snapshot) = recover_snapshot(project, version).await? {
            recovered.push(snapshot);
        }
    }

    let outcome = reconcile(&stored, &tags, recovered);
    if outcome.dirty {
        info!(
            project = %project.path.display(),
            recovered = ?outcome.recovered,
            dropped = ?outcome.dropped,
            next_version = outcome.index.next_version,
            "Repaired snapshot index from tags"
        );
        project.store.save(&outcome.index).await?;
    } else {
        debug!(snapshots = outcome.index.len(), "Snapshot index matches tags");
    }

    Ok(outcome.index)
}

/// All snapshots of a project, ascending by version.
pub(crate) async fn list_snapshots(project: &Project<'_>) -> SnapshotResult<Vec<Snapshot>> {
    if !project.repo.is_repository() {
        return Ok(Vec::new());
    }
    Ok(load_reconciled(project).await?.snapshots)
}

/// Repository status with stepback's own directories excluded.
pub(crate) async fn repository_status(project: &Project<'_>) -> SnapshotResult<RepoStatus> {
    if project.repo.is_repository() {
        project.exclude_private_dirs().await?;
    }
    project.repo.status().await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(version: u32) -> Snapshot {
        Snapshot::new(version, format!("commit{version}"), vec![])
    }

    fn index_of(versions: &[u32]) -> MetadataIndex {
        let mut index = MetadataIndex::default();
        for v in versions {
            index.record(snap(*v));
        }
        index
    }

    #[test]
    fn test_in_sync_is_clean() {
        let stored = index_of(&[1, 2, 3]);
        let outcome = reconcile(&stored, &[3, 1, 2], vec![]);

        assert!(!outcome.dirty);
        assert_eq!(outcome.index, stored);
        assert!(outcome.recovered.is_empty());
        assert!(outcome.dropped.is_empty());
    }

    #[test]
    fn test_stored_records_kept_verbatim() {
        let mut stored = index_of(&[1]);
        stored.snapshots[0].message = "custom".into();
        stored.snapshots[0].files_changed = vec!["kept.rs".into()];

        let outcome = reconcile(&stored, &[1], vec![Snapshot::new(1, "other", vec![])]);
        assert_eq!(outcome.index.snapshots[0].message, "custom");
        assert_eq!(outcome.index.snapshots[0].files_changed, vec!["kept.rs"]);
    }

    #[test]
    fn test_unindexed_tags_are_recovered() {
        let stored = index_of(&[1]);
        assert_eq!(missing_versions(&stored, &[1, 2, 3]), vec![2, 3]);

        let outcome = reconcile(&stored, &[1, 2, 3], vec![snap(3), snap(2)]);
        assert!(outcome.dirty);
        assert_eq!(outcome.index.versions(), vec![1, 2, 3]);
        assert_eq!(outcome.index.next_version, 4);
        assert_eq!(outcome.recovered, vec![2, 3]);
    }

    #[test]
    fn test_lost_index_rebuilt_from_tags() {
        let outcome = reconcile(&MetadataIndex::default(), &[1, 2], vec![snap(1), snap(2)]);

        assert!(outcome.dirty);
        assert_eq!(outcome.index.len(), 2);
        assert_eq!(outcome.index.next_version, 3);
        assert!(outcome.index.current_version.is_none());
    }

    #[test]
    fn test_entries_without_tags_are_dropped() {
        let mut stored = index_of(&[1, 2, 3]);
        stored.current_version = Some(2);

        let outcome = reconcile(&stored, &[1, 3], vec![]);
        assert!(outcome.dirty);
        assert_eq!(outcome.index.versions(), vec![1, 3]);
        assert_eq!(outcome.dropped, vec![2]);
        // Counter never moves backwards.
        assert_eq!(outcome.index.next_version, 4);
        assert_eq!(outcome.index.current_version, Some(2));
    }

    #[test]
    fn test_unrecoverable_tag_is_skipped() {
        let outcome = reconcile(&MetadataIndex::default(), &[1, 2], vec![snap(2)]);
        assert_eq!(outcome.index.versions(), vec![2]);
        assert_eq!(outcome.index.next_version, 3);
    }

    #[test]
    fn test_counter_behind_tags_is_repaired() {
        let mut stored = index_of(&[1, 2]);
        stored.next_version = 2;

        let outcome = reconcile(&stored, &[1, 2], vec![]);
        assert!(outcome.dirty);
        assert_eq!(outcome.index.next_version, 3);
    }

    #[test]
    fn test_out_of_order_index_is_rewritten_sorted() {
        let mut stored = index_of(&[1, 2]);
        stored.snapshots.reverse();

        let outcome = reconcile(&stored, &[1, 2], vec![]);
        assert!(outcome.dirty);
        assert_eq!(outcome.index.versions(), vec![1, 2]);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let stored = index_of(&[1, 4]);
        let first = reconcile(&stored, &[1, 2, 4], vec![snap(2)]);
        let second = reconcile(&first.index, &[1, 2, 4], vec![]);

        assert!(!second.dirty);
        assert_eq!(second.index, first.index);
    }

    #[test]
    fn test_no_tags_empty_index_is_clean() {
        let outcome = reconcile(&MetadataIndex::default(), &[], vec![]);
        assert!(!outcome.dirty);
        assert_eq!(outcome.index.next_version, 1);
    }

    #[test]
    fn test_highest_recovered_tag_does_not_overflow() {
        let top = u32::MAX - 1;
        let outcome = reconcile(&MetadataIndex::default(), &[top], vec![snap(top)]);

        assert!(outcome.dirty);
        assert_eq!(outcome.index.next_version, u32::MAX);
        assert!(outcome.index.is_consistent());
    }
}

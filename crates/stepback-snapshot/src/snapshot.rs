//! Snapshot data structures.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Prefix shared by every snapshot tag.
pub const TAG_PREFIX: &str = "snapshot-v";

/// Glob handed to `git tag --list` to enumerate candidate tags.
pub const TAG_GLOB: &str = "snapshot-v*";

/// Exclusive upper bound for snapshot versions.
pub const MAX_VERSION: u32 = u32::MAX;

static TAG_REGEX: OnceLock<Regex> = OnceLock::new();

fn tag_regex() -> &'static Regex {
    TAG_REGEX.get_or_init(|| {
        Regex::new(r"^snapshot-v(\d+)$")
            .expect("Invalid regex pattern - this is a compile-time constant")
    })
}

/// Tag name for a snapshot version.
pub fn tag_for(version: u32) -> String {
    format!("{TAG_PREFIX}{version}")
}

/// Commit message for a snapshot version.
pub fn message_for(version: u32) -> String {
    format!("Snapshot V{version}")
}

/// Parse a snapshot tag back to its version.
///
/// Only `snapshot-v<N>` with `0 < N < u32::MAX` matches; `snapshot-v1-old`
/// or `snapshot-v0` do not. The top value is reserved so a successor
/// version always exists.
pub fn parse_tag(tag: &str) -> Option<u32> {
    let captures = tag_regex().captures(tag.trim())?;
    let version: u32 = captures.get(1)?.as_str().parse().ok()?;
    (version > 0 && version < MAX_VERSION).then_some(version)
}

/// An automatically created checkpoint, backed by one commit and one tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Version number, unique and increasing within a project.
    pub version: u32,

    /// Commit the tag points at.
    pub commit_ref: String,

    /// Tag name, always `snapshot-v<version>`.
    pub tag: String,

    /// Creation time in epoch milliseconds.
    pub timestamp: i64,

    /// Commit message.
    pub message: String,

    /// Paths touched by the commit, relative to the project root.
    #[serde(default)]
    pub files_changed: Vec<String>,
}

impl Snapshot {
    /// Build a snapshot record for a freshly created commit.
    pub fn new(version: u32, commit_ref: impl Into<String>, files_changed: Vec<String>) -> Self {
        Self {
            version,
            commit_ref: commit_ref.into(),
            tag: tag_for(version),
            timestamp: Utc::now().timestamp_millis(),
            message: message_for(version),
            files_changed,
        }
    }

    /// Creation time as a UTC datetime.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(self.timestamp)
    }

    /// Abbreviated commit id for display.
    pub fn short_ref(&self) -> &str {
        let end = self
            .commit_ref
            .char_indices()
            .nth(7)
            .map(|(i, _)| i)
            .unwrap_or(self.commit_ref.len());
        &self.commit_ref[..end]
    }
}

/// The fast-access index of known snapshots for one project.
///
/// Persisted as `snapshots.json` in the project's hidden directory and
/// always rewritten whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetadataIndex {
    /// Known snapshots, ascending by version.
    pub snapshots: Vec<Snapshot>,

    /// Version the next snapshot will receive.
    pub next_version: u32,

    /// Version the working tree was last created at or restored to.
    pub current_version: Option<u32>,
}

impl Default for MetadataIndex {
    fn default() -> Self {
        Self {
            snapshots: Vec::new(),
            next_version: 1,
            current_version: None,
        }
    }
}

impl MetadataIndex {
    /// Look up a snapshot by version.
    pub fn get(&self, version: u32) -> Option<&Snapshot> {
        self.snapshots
            .binary_search_by_key(&version, |s| s.version)
            .ok()
            .map(|idx| &self.snapshots[idx])
    }

    /// Whether a version is present.
    pub fn contains(&self, version: u32) -> bool {
        self.get(version).is_some()
    }

    /// Highest known version.
    pub fn max_version(&self) -> Option<u32> {
        self.snapshots.last().map(|s| s.version)
    }

    /// All versions in ascending order.
    pub fn versions(&self) -> Vec<u32> {
        self.snapshots.iter().map(|s| s.version).collect()
    }

    /// Number of known snapshots.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether no snapshots are known.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Append a newly created snapshot and make it current.
    pub fn record(&mut self, snapshot: Snapshot) {
        let version = snapshot.version;
        self.snapshots.push(snapshot);
        self.snapshots.sort_by_key(|s| s.version);
        self.next_version = self.next_version.max(version.saturating_add(1));
        self.current_version = Some(version);
    }

    /// Drop the given versions from the index, returning what was removed.
    pub fn remove(&mut self, versions: &[u32]) -> Vec<Snapshot> {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.snapshots)
            .into_iter()
            .partition(|s| versions.contains(&s.version));
        self.snapshots = kept;
        removed
    }

    /// Whether snapshots are strictly ascending and `next_version` is ahead
    /// of all of them.
    pub fn is_consistent(&self) -> bool {
        let ascending = self
            .snapshots
            .windows(2)
            .all(|pair| pair[0].version < pair[1].version);
        let ahead = self
            .max_version()
            .map_or(self.next_version >= 1, |max| self.next_version > max);
        ascending && ahead
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(version: u32) -> Snapshot {
        Snapshot::new(version, format!("{:040x}", version), vec!["a.txt".into()])
    }

    #[test]
    fn test_tag_round_trip() {
        assert_eq!(tag_for(12), "snapshot-v12");
        assert_eq!(parse_tag("snapshot-v12"), Some(12));
        assert_eq!(message_for(3), "Snapshot V3");
    }

    #[test]
    fn test_parse_tag_rejects_lookalikes() {
        assert_eq!(parse_tag("snapshot-v"), None);
        assert_eq!(parse_tag("snapshot-v0"), None);
        assert_eq!(parse_tag("snapshot-v1-backup"), None);
        assert_eq!(parse_tag("snapshot-vx"), None);
        assert_eq!(parse_tag("v1"), None);
        assert_eq!(parse_tag("snapshot-v99999999999"), None);
    }

    #[test]
    fn test_parse_tag_reserves_top_version() {
        assert_eq!(parse_tag("snapshot-v4294967295"), None);
        assert_eq!(parse_tag("snapshot-v4294967294"), Some(u32::MAX - 1));
    }

    #[test]
    fn test_record_highest_version_keeps_counter_ahead() {
        let mut index = MetadataIndex::default();
        index.record(snapshot(u32::MAX - 1));
        assert_eq!(index.next_version, u32::MAX);
        assert!(index.is_consistent());
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let snap = snapshot(1);
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["tag"], "snapshot-v1");
        assert!(json.get("commitRef").is_some());
        assert!(json.get("filesChanged").is_some());
    }

    #[test]
    fn test_short_ref() {
        let snap = snapshot(1);
        assert_eq!(snap.short_ref().len(), 7);

        let mut short = snap.clone();
        short.commit_ref = "abc".into();
        assert_eq!(short.short_ref(), "abc");
    }

    #[test]
    fn test_index_defaults() {
        let index: MetadataIndex = serde_json::from_str("{}").unwrap();
        assert_eq!(index, MetadataIndex::default());
        assert_eq!(index.next_version, 1);
        assert!(index.current_version.is_none());
    }

    #[test]
    fn test_record_advances_counters() {
        let mut index = MetadataIndex::default();
        index.record(snapshot(1));
        index.record(snapshot(2));

        assert_eq!(index.versions(), vec![1, 2]);
        assert_eq!(index.next_version, 3);
        assert_eq!(index.current_version, Some(2));
        assert!(index.is_consistent());
    }

    #[test]
    fn test_remove_returns_removed() {
        let mut index = MetadataIndex::default();
        for v in 1..=4 {
            index.record(snapshot(v));
        }

        let removed = index.remove(&[1, 3]);
        assert_eq!(removed.iter().map(|s| s.version).collect::<Vec<_>>(), [1, 3]);
        assert_eq!(index.versions(), vec![2, 4]);
        assert!(index.get(3).is_none());
        assert!(index.get(4).is_some());
    }

    #[test]
    fn test_inconsistent_index() {
        let mut index = MetadataIndex::default();
        index.record(snapshot(2));
        index.next_version = 2;
        assert!(!index.is_consistent());
    }
}

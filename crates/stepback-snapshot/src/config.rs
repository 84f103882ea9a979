//! Snapshot configuration.
//!
//! Configuration is loaded from multiple sources and merged, later sources
//! overriding earlier ones field by field:
//! 1. Global config: `~/.config/stepback/config.json`
//! 2. Environment variable: `STEPBACK_CONFIG_CONTENT` (inline JSON)
//! 3. Project config: `<project>/.stepback/config.json`

use crate::{SnapshotError, SnapshotResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use stepback_util::path::PROJECT_DIR_NAME;

/// Environment variable holding inline JSON configuration.
pub const CONFIG_ENV: &str = "STEPBACK_CONFIG_CONTENT";

/// Name of the configuration file in global and project directories.
pub const CONFIG_FILE: &str = "config.json";

/// How stage, commit and tag are run when creating a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Wait for each command and propagate failures.
    #[default]
    Confirmed,
    /// Start each command without waiting, then pause for its settle delay.
    /// Failures are only logged.
    Background,
}

/// Pauses after each fire-and-forget command in [`ExecutionMode::Background`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettleDelays {
    pub stage_ms: u64,
    pub commit_ms: u64,
    pub tag_ms: u64,
}

impl Default for SettleDelays {
    fn default() -> Self {
        Self {
            stage_ms: 300,
            commit_ms: 400,
            tag_ms: 150,
        }
    }
}

/// Resolved configuration for the snapshot engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SnapshotConfig {
    /// Whether snapshots are created at all.
    pub enabled: bool,

    /// Whether submitted input triggers a snapshot.
    pub auto_snapshot: bool,

    /// Retention cap. `0` keeps everything.
    pub max_snapshots: usize,

    /// Upper bound for each timed git command.
    pub command_timeout_ms: u64,

    pub execution: ExecutionMode,

    pub settle: SettleDelays,

    /// How long the input trigger waits for its snapshot before letting
    /// input through.
    pub trigger_wait_ms: u64,

    /// Project-relative hidden directory for the index.
    pub metadata_dir: String,

    /// `.gitignore` lines written when stepback initializes a repository.
    pub default_ignore: Vec<String>,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_snapshot: true,
            max_snapshots: 50,
            command_timeout_ms: 5_000,
            execution: ExecutionMode::Confirmed,
            settle: SettleDelays::default(),
            trigger_wait_ms: 1_500,
            metadata_dir: PROJECT_DIR_NAME.to_string(),
            default_ignore: [
                "node_modules/",
                "target/",
                "dist/",
                "build/",
                ".venv/",
                "__pycache__/",
                "*.log",
                ".env",
                ".DS_Store",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl SnapshotConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn trigger_wait(&self) -> Duration {
        Duration::from_millis(self.trigger_wait_ms)
    }

    /// Load configuration from all sources.
    ///
    /// Returns the merged configuration and the files it was read from.
    pub async fn load(project_dir: Option<&Path>) -> SnapshotResult<(Self, Vec<PathBuf>)> {
        let mut layer = ConfigLayer::default();
        let mut sources = Vec::new();

        // 1. Global config
        if let Some(global) = stepback_util::path::config_dir().map(|d| d.join(CONFIG_FILE)) {
            if tokio::fs::try_exists(&global).await? {
                layer = layer.merge(ConfigLayer::load_file(&global).await?);
                sources.push(global);
            }
        }

        // 2. Inline environment config
        if let Ok(content) = std::env::var(CONFIG_ENV) {
            layer = layer.merge(ConfigLayer::parse(&content, "<env>")?);
        }

        // 3. Project config
        if let Some(dir) = project_dir {
            let path = dir.join(PROJECT_DIR_NAME).join(CONFIG_FILE);
            if tokio::fs::try_exists(&path).await? {
                layer = layer.merge(ConfigLayer::load_file(&path).await?);
                sources.push(path);
            }
        }

        Ok((layer.resolve(), sources))
    }
}

/// One configuration source; unset fields defer to earlier sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigLayer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_snapshot: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_snapshots: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settle: Option<SettleDelays>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_wait_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_ignore: Option<Vec<String>>,
}

impl ConfigLayer {
    /// Load a layer from a JSON file.
    pub async fn load_file(path: &Path) -> SnapshotResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content, &path.display().to_string())
    }

    /// Parse a layer from JSON text. `origin` names the source in errors.
    pub fn parse(content: &str, origin: &str) -> SnapshotResult<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(content).map_err(|e| SnapshotError::Config {
            path: origin.to_string(),
            message: e.to_string(),
        })
    }

    /// Merge another layer into this one (other takes precedence).
    pub fn merge(self, other: Self) -> Self {
        Self {
            enabled: other.enabled.or(self.enabled),
            auto_snapshot: other.auto_snapshot.or(self.auto_snapshot),
            max_snapshots: other.max_snapshots.or(self.max_snapshots),
            command_timeout_ms: other.command_timeout_ms.or(self.command_timeout_ms),
            execution: other.execution.or(self.execution),
            settle: other.settle.or(self.settle),
            trigger_wait_ms: other.trigger_wait_ms.or(self.trigger_wait_ms),
            metadata_dir: other.metadata_dir.or(self.metadata_dir),
            default_ignore: other.default_ignore.or(self.default_ignore),
        }
    }

    /// Fill unset fields from the defaults.
    pub fn resolve(self) -> SnapshotConfig {
        let defaults = SnapshotConfig::default();
        SnapshotConfig {
            enabled: self.enabled.unwrap_or(defaults.enabled),
            auto_snapshot: self.auto_snapshot.unwrap_or(defaults.auto_snapshot),
            max_snapshots: self.max_snapshots.unwrap_or(defaults.max_snapshots),
            command_timeout_ms: self
                .command_timeout_ms
                .filter(|ms| *ms > 0)
                .unwrap_or(defaults.command_timeout_ms),
            execution: self.execution.unwrap_or(defaults.execution),
            settle: self.settle.unwrap_or(defaults.settle),
            trigger_wait_ms: self.trigger_wait_ms.unwrap_or(defaults.trigger_wait_ms),
            metadata_dir: self
                .metadata_dir
                .filter(|d| !d.trim().is_empty())
                .unwrap_or(defaults.metadata_dir),
            default_ignore: self.default_ignore.unwrap_or(defaults.default_ignore),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SnapshotConfig::default();
        assert!(config.enabled);
        assert_eq!(config.max_snapshots, 50);
        assert_eq!(config.command_timeout(), Duration::from_secs(5));
        assert_eq!(config.execution, ExecutionMode::Confirmed);
        assert_eq!(config.settle.stage_ms, 300);
        assert_eq!(config.settle.commit_ms, 400);
        assert_eq!(config.settle.tag_ms, 150);
        assert_eq!(config.metadata_dir, ".stepback");
    }

    #[test]
    fn test_parse_camel_case() {
        let layer = ConfigLayer::parse(
            r#"{"maxSnapshots": 10, "execution": "background", "settle": {"commitMs": 900}}"#,
            "test",
        )
        .unwrap();
        let config = layer.resolve();

        assert_eq!(config.max_snapshots, 10);
        assert_eq!(config.execution, ExecutionMode::Background);
        assert_eq!(config.settle.commit_ms, 900);
        // Unset nested fields keep their defaults.
        assert_eq!(config.settle.stage_ms, 300);
    }

    #[test]
    fn test_merge_prefers_later_layer() {
        let global = ConfigLayer {
            max_snapshots: Some(20),
            auto_snapshot: Some(false),
            ..Default::default()
        };
        let project = ConfigLayer {
            max_snapshots: Some(5),
            ..Default::default()
        };

        let config = global.merge(project).resolve();
        assert_eq!(config.max_snapshots, 5);
        assert!(!config.auto_snapshot);
    }

    #[test]
    fn test_invalid_json_reports_origin() {
        let err = ConfigLayer::parse("{ nope", "/tmp/config.json").unwrap_err();
        assert!(matches!(err, SnapshotError::Config { ref path, .. } if path == "/tmp/config.json"));
    }

    #[test]
    fn test_zero_timeout_and_blank_dir_fall_back() {
        let layer = ConfigLayer {
            command_timeout_ms: Some(0),
            metadata_dir: Some("  ".into()),
            ..Default::default()
        };
        let config = layer.resolve();
        assert_eq!(config.command_timeout_ms, 5_000);
        assert_eq!(config.metadata_dir, ".stepback");
    }

    #[tokio::test]
    async fn test_load_project_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join(PROJECT_DIR_NAME);
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join(CONFIG_FILE),
            r#"{"maxSnapshots": 3, "triggerWaitMs": 50}"#,
        )
        .unwrap();

        let (config, sources) = SnapshotConfig::load(Some(dir.path())).await.unwrap();
        assert_eq!(config.max_snapshots, 3);
        assert_eq!(config.trigger_wait(), Duration::from_millis(50));
        assert!(sources.contains(&config_dir.join(CONFIG_FILE)));
    }
}

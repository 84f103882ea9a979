//! Logging setup using tracing.
//!
//! This module provides consistent logging configuration across stepback.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Verbosity applied to the stepback crates, quietest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    const ALL: [LogLevel; 5] = [
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Debug,
        LogLevel::Trace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// Case-insensitive lookup by name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(name.trim()))
    }

    /// Filter directive scoped to the stepback crates.
    ///
    /// Other crates stay at `warn` so dependency noise does not drown
    /// snapshot activity.
    pub fn directive(&self) -> String {
        let level = self.as_str();
        format!(
            "warn,stepback={level},stepback_snapshot={level},stepback_storage={level},stepback_util={level}"
        )
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether to print logs to stderr.
    pub print: bool,
    /// Log level.
    pub level: LogLevel,
    /// Whether to include file/line info in logs.
    pub include_location: bool,
    /// Log file path (if any). Used when `print` is false.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            print: false,
            level: LogLevel::Info,
            include_location: false,
            file: None,
        }
    }
}

/// Initialize logging with the given configuration.
///
/// This should be called once at application startup. `RUST_LOG` takes
/// precedence over the configured level. Returns the log file actually in
/// use, if any.
pub fn init(config: LogConfig) -> Option<PathBuf> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.directive()));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.print {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location);

        let _ = subscriber.with(fmt_layer).try_init();
        return None;
    }

    let Some(path) = config.file else {
        // Nothing to write to; spans still work.
        let _ = subscriber.try_init();
        return None;
    };

    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            eprintln!("Warning: Could not create log directory: {e}");
            let _ = subscriber.try_init();
            return None;
        }
    }

    let file = match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not open log file: {e}");
            let _ = subscriber.try_init();
            return None;
        }
    };

    let fmt_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    let _ = subscriber.with(fmt_layer).try_init();
    Some(path)
}

/// Get the default log file path.
pub fn default_log_path() -> Option<PathBuf> {
    crate::path::logs_dir().map(|p| p.join("stepback.log"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_names() {
        assert_eq!(LogLevel::from_name("trace"), Some(LogLevel::Trace));
        assert_eq!(LogLevel::from_name(" WARN "), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_name("verbose"), None);
        for level in LogLevel::ALL {
            assert_eq!(LogLevel::from_name(level.as_str()), Some(level));
        }
    }

    #[test]
    fn test_levels_are_ordered_by_verbosity() {
        assert!(LogLevel::Error < LogLevel::Info);
        assert!(LogLevel::Debug < LogLevel::Trace);
    }

    #[test]
    fn test_directive_scopes_stepback_crates() {
        let directive = LogLevel::Debug.directive();
        assert!(directive.starts_with("warn,"));
        assert!(directive.contains("stepback_snapshot=debug"));
    }

    #[test]
    fn test_default_log_config() {
        let config = LogConfig::default();
        assert!(!config.print);
        assert_eq!(config.level, LogLevel::Info);
        assert!(config.file.is_none());
    }
}

//! Logging initialization.
//!
//! Verbose runs log to stderr; everything else goes to a file in the
//! platform state directory so command output stays clean.

use std::path::PathBuf;
use stepback_util::log::{self, LogConfig, LogLevel};

/// Environment variable overriding the file log level.
const LOG_LEVEL_ENV: &str = "STEPBACK_LOG_LEVEL";

/// Initialize logging. Returns the log file path when logging to a file.
pub fn init_logging(verbose: bool) -> Option<PathBuf> {
    if verbose {
        return log::init(LogConfig {
            print: true,
            level: LogLevel::Debug,
            include_location: false,
            file: None,
        });
    }

    let level = std::env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|name| LogLevel::from_name(&name))
        .unwrap_or_default();

    log::init(LogConfig {
        level,
        file: log::default_log_path(),
        ..Default::default()
    })
}

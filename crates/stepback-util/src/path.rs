//! Path utilities.
//!
//! This module provides the well-known stepback directories and small
//! helpers for keying projects by path.

use std::path::{Component, Path, PathBuf};

/// Name of the per-project hidden directory holding stepback state.
pub const PROJECT_DIR_NAME: &str = ".stepback";

/// Get the stepback configuration directory.
///
/// On Unix this prefers `~/.config/stepback` when it exists, then falls
/// back to the platform configuration directory.
pub fn config_dir() -> Option<PathBuf> {
    #[cfg(unix)]
    {
        if let Some(home) = dirs::home_dir() {
            let xdg_config = home.join(".config").join("stepback");
            if xdg_config.exists() {
                return Some(xdg_config);
            }
        }
    }

    dirs::config_dir().map(|p| p.join("stepback"))
}

/// Get the stepback state directory (logs and other runtime output).
pub fn state_dir() -> Option<PathBuf> {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .map(|p| p.join("stepback"))
}

/// Get the stepback logs directory.
pub fn logs_dir() -> Option<PathBuf> {
    state_dir().map(|p| p.join("logs"))
}

/// Get the project-local stepback directory.
pub fn project_dir(project_root: &Path, dir_name: &str) -> PathBuf {
    project_root.join(dir_name)
}

/// Normalize a path by removing `.` and `..` components.
///
/// Unlike `canonicalize`, this doesn't require the path to exist.
pub fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();

    for component in path.components() {
        match component {
            Component::ParentDir => {
                result.pop();
            }
            Component::CurDir => {}
            _ => {
                result.push(component);
            }
        }
    }

    result
}

/// Stable key for a project directory.
///
/// Canonicalizes when the directory exists so `./proj` and `/abs/proj`
/// map to the same key; otherwise falls back to lexical normalization.
pub fn project_key(path: &Path) -> PathBuf {
    match path.canonicalize() {
        Ok(p) => p,
        Err(_) => {
            let absolute = if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf())
            };
            normalize(&absolute)
        }
    }
}

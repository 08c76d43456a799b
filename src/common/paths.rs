//! Platform-appropriate configuration and data paths
//!
//! Uses the directories crate:
//! - Linux: `~/.config/visual-robot/`, `~/.local/share/visual-robot/`
//! - macOS: `~/Library/Application Support/visual-robot/`
//! - Windows: `%APPDATA%\visual-robot\`

use std::path::{Path, PathBuf};

/// Name used for the configuration and data directories
const APP_NAME: &str = "visual-robot";

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Directory holding the screenshots of one test run
pub fn screenshot_dir(test_id: &str) -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().join("screenshots").join(test_id))
}

/// Resolve `path` against `base` unless it is already absolute
pub fn resolve_relative(base: &Path, path: &Path) -> PathBuf {
    if path.is_relative() {
        base.join(path)
    } else {
        path.to_path_buf()
    }
}

/// Resolve the executable named by `binary`
///
/// Absolute paths are kept, bare names (no directory part) are looked up on
/// `PATH`, anything else is relative to `base`.
pub fn resolve_binary(base: &Path, binary: &str) -> PathBuf {
    let path = Path::new(binary);
    if path.is_absolute() {
        return path.to_path_buf();
    }
    if path.components().count() == 1 {
        if let Ok(found) = which::which(binary) {
            return found;
        }
    }
    base.join(path)
}

//! Application under test: its process and its window
//!
//! Lookups are scoped to the application's window once one is known. The
//! window is picked from what the backend lists; the process is either one
//! that was already running the same executable or one we started.

use std::path::{Path, PathBuf};

use super::Region;

/// Which top-level window belongs to the application
///
/// Every criterion that is set must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowMatcher {
    pub pid: Option<u32>,
    pub title: Option<String>,
    pub app_name: Option<String>,
}

impl WindowMatcher {
    /// Matcher from settings; `pid` is filled in once the application runs
    pub fn new(title: Option<String>, app_name: Option<String>) -> Self {
        Self {
            pid: None,
            title,
            app_name,
        }
    }

    /// Nothing to match on, so lookups cover the whole screen
    pub fn is_empty(&self) -> bool {
        self.pid.is_none() && self.title.is_none() && self.app_name.is_none()
    }

    pub fn matches(&self, window: &WindowInfo) -> bool {
        self.pid.map_or(true, |pid| pid == window.pid)
            && self.title.as_deref().map_or(true, |t| t == window.title)
            && self.app_name.as_deref().map_or(true, |a| a == window.app_name)
    }
}

/// What the backend reports about one top-level window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    pub pid: u32,
    pub title: String,
    pub app_name: String,
    /// Bounds in desktop points
    pub bounds: Region,
    pub minimized: bool,
}

/// First window `matcher` accepts that can be seen
pub fn pick_window<'a>(matcher: &WindowMatcher, windows: &'a [WindowInfo]) -> Option<&'a WindowInfo> {
    windows.iter().find(|w| {
        !w.minimized && w.bounds.width > 0 && w.bounds.height > 0 && matcher.matches(w)
    })
}

/// Pid of a running process whose executable is `binary`
pub fn running_pid<'a, I>(binary: &Path, processes: I) -> Option<u32>
where
    I: IntoIterator<Item = (u32, Option<&'a Path>)>,
{
    let wanted = canonical(binary);
    processes
        .into_iter()
        .find(|(_, exe)| exe.is_some_and(|exe| canonical(exe) == wanted))
        .map(|(pid, _)| pid)
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

//! Configuration file handling
//!
//! Tool settings live in an optional TOML file; every field has a default so
//! a missing file (or a partial one) is fine.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths::config_path;
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Which display to drive
    #[serde(default)]
    pub screen: ScreenConfig,

    /// Template matching settings
    #[serde(default)]
    pub matching: MatchingConfig,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Default locations of the env file and template images
    #[serde(default)]
    pub paths: PathsConfig,

    /// How the application window is found and shut down
    #[serde(default)]
    pub window: WindowConfig,
}

/// Screen selection
#[derive(Debug, Deserialize, Clone)]
pub struct ScreenConfig {
    /// Monitor index, 0 is the primary display
    #[serde(default)]
    pub index: usize,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self { index: 0 }
    }
}

/// Template matching settings
#[derive(Debug, Deserialize, Clone)]
pub struct MatchingConfig {
    /// Minimum correlation score (0.0 - 1.0) for a match
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            confidence: default_confidence(),
        }
    }
}

fn default_confidence() -> f32 {
    0.8
}

/// Timeout settings
#[derive(Debug, Deserialize, Clone)]
pub struct Timeouts {
    /// How long a click or wait looks for its template when the step gives no timeout
    #[serde(default = "default_wait")]
    pub default_wait_secs: u64,

    /// How long the first lookup after launching the application may take
    #[serde(default = "default_launch_wait")]
    pub launch_wait_secs: u64,

    /// Pause between two lookups of the same template
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            default_wait_secs: default_wait(),
            launch_wait_secs: default_launch_wait(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

fn default_wait() -> u64 {
    3
}
fn default_launch_wait() -> u64 {
    20
}
fn default_poll_interval() -> u64 {
    500
}

impl Timeouts {
    pub fn default_wait(&self) -> Duration {
        Duration::from_secs(self.default_wait_secs)
    }

    pub fn launch_wait(&self) -> Duration {
        Duration::from_secs(self.launch_wait_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        // A zero interval would spin on the backend
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Default file locations, relative to the working directory
#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    #[serde(default = "default_env_file")]
    pub env_file: PathBuf,

    #[serde(default = "default_images")]
    pub images: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            env_file: default_env_file(),
            images: default_images(),
        }
    }
}

fn default_env_file() -> PathBuf {
    PathBuf::from("../.env")
}
fn default_images() -> PathBuf {
    PathBuf::from("resources/images")
}

/// Application window settings
#[derive(Debug, Deserialize, Clone)]
pub struct WindowConfig {
    /// Only windows with exactly this title belong to the application
    #[serde(default)]
    pub title: Option<String>,

    /// Only windows of this application name (class) belong to the application
    #[serde(default)]
    pub app_name: Option<String>,

    /// Attach to an already running instance instead of starting another
    #[serde(default = "default_reuse_running")]
    pub reuse_running: bool,

    /// How long a terminated application may take to exit before it is killed
    #[serde(default = "default_close_wait")]
    pub close_wait_secs: u64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: None,
            app_name: None,
            reuse_running: default_reuse_running(),
            close_wait_secs: default_close_wait(),
        }
    }
}

fn default_reuse_running() -> bool {
    true
}
fn default_close_wait() -> u64 {
    5
}

impl WindowConfig {
    pub fn close_wait(&self) -> Duration {
        Duration::from_secs(self.close_wait_secs)
    }
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            super::Error::ConfigParse(format!("{}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| super::Error::ConfigParse(format!("{}: {}", path.display(), e)))?;

        if !(0.0..=1.0).contains(&config.matching.confidence) {
            return Err(super::Error::ConfigParse(format!(
                "{}: matching.confidence must be between 0.0 and 1.0, got {}",
                path.display(),
                config.matching.confidence
            )));
        }

        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }
}

//! Error types for visual-robot
//!
//! Messages name the file, key or template involved so a failed run can be
//! diagnosed from the one line printed at the end.

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for visual-robot
#[derive(Error, Debug)]
pub enum Error {
    // === Env File Errors ===
    #[error("Failed to load env file '{}': {source}", path.display())]
    EnvFileRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid env file '{}' at line {line}: {reason}", path.display())]
    EnvParse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Required key '{key}' missing from env file '{}'", path.display())]
    MissingKey { key: String, path: PathBuf },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Failed to parse test scenario '{}': {reason}", path.display())]
    ScenarioParse { path: PathBuf, reason: String },

    // === Template Errors ===
    #[error("Template '{name}' not found. Searched: {searched}")]
    TemplateNotFound { name: String, searched: String },

    #[error("Failed to load image '{}': {reason}", path.display())]
    ImageLoad { path: PathBuf, reason: String },

    #[error("Template '{name}' ({template_size}) is larger than the screen image ({screen_size})")]
    TemplateTooLarge {
        name: String,
        template_size: String,
        screen_size: String,
    },

    // === Match Errors ===
    #[error("Could not find '{template}' on screen {screen} within {timeout:?}")]
    FindFailed {
        template: String,
        screen: usize,
        timeout: Duration,
    },

    #[error("Multiple ({count}) matches found for '{template}'")]
    AmbiguousMatch { template: String, count: usize },

    // === Backend Errors ===
    #[error("Screen {index} not found ({available} available)")]
    ScreenNotFound { index: usize, available: usize },

    #[error("Failed to launch '{}': {source}", path.display())]
    LaunchFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Automation backend error: {0}")]
    Backend(String),

    #[error("Desktop backend not available: rebuild with `--features desktop` or use --dry-run")]
    BackendUnavailable,

    // === Test Errors ===
    #[error("Test assertion failed: {0}")]
    TestAssertion(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a template not found error with the searched directories
    pub fn template_not_found<P: AsRef<std::path::Path>>(name: &str, dirs: &[P]) -> Self {
        let searched = if dirs.is_empty() {
            "no image directories registered".to_string()
        } else {
            dirs.iter()
                .map(|d| d.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        Self::TemplateNotFound {
            name: name.to_string(),
            searched,
        }
    }

    /// Create an image load error
    pub fn image_load(path: &std::path::Path, reason: impl ToString) -> Self {
        Self::ImageLoad {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error is a configuration problem detected before any UI action
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::EnvFileRead { .. }
                | Error::EnvParse { .. }
                | Error::MissingKey { .. }
                | Error::Config(_)
                | Error::ConfigParse(_)
                | Error::ScenarioParse { .. }
        )
    }
}

//! Dotenv-style key/value file
//!
//! Holds the values a scenario needs from outside the repository: the
//! application binary and the login credentials. The file is read once and
//! the resulting [`EnvFile`] is passed explicitly to whoever needs it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::{Error, Result};

/// Parsed contents of a `KEY=VALUE` file
#[derive(Debug, Clone)]
pub struct EnvFile {
    path: PathBuf,
    values: HashMap<String, String>,
}

impl EnvFile {
    /// Read and parse the file at `path`
    ///
    /// A missing or unreadable file is an error; there is no fallback to
    /// an empty table.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::EnvFileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let env = Self::parse(path, &content)?;
        tracing::debug!(path = %path.display(), keys = env.values.len(), "Loaded env file");
        Ok(env)
    }

    /// Parse `content` as if it had been read from `path`
    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        let mut values = HashMap::new();

        for (i, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line = line.strip_prefix("export ").unwrap_or(line);

            let (key, value) = line.split_once('=').ok_or_else(|| Error::EnvParse {
                path: path.to_path_buf(),
                line: i + 1,
                reason: "expected KEY=VALUE".to_string(),
            })?;

            let key = key.trim();
            if key.is_empty() {
                return Err(Error::EnvParse {
                    path: path.to_path_buf(),
                    line: i + 1,
                    reason: "empty key".to_string(),
                });
            }

            values.insert(key.to_string(), unquote(value.trim()).to_string());
        }

        Ok(Self {
            path: path.to_path_buf(),
            values,
        })
    }

    /// Path the values were read from
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Fetch a key that must be present
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| Error::MissingKey {
            key: key.to_string(),
            path: self.path.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Strip one pair of matching surrounding quotes
fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

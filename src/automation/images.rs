//! Template image registry
//!
//! Templates are referred to by file name (`"LoginLink.png"`) and looked up
//! in the registered directories, first match wins.

use std::path::{Path, PathBuf};

use crate::common::{Error, Result};

/// Ordered list of directories holding template images
#[derive(Debug, Default, Clone)]
pub struct ImagePath {
    dirs: Vec<PathBuf>,
}

impl ImagePath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a directory; it must exist
    pub fn add(&mut self, dir: &Path) -> Result<()> {
        if !dir.is_dir() {
            return Err(Error::Config(format!(
                "Image path '{}' is not a directory",
                dir.display()
            )));
        }
        if !self.dirs.iter().any(|d| d == dir) {
            tracing::debug!(dir = %dir.display(), "Registered image path");
            self.dirs.push(dir.to_path_buf());
        }
        Ok(())
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Find the file for template `name`
    ///
    /// Names without an extension get `.png`. Absolute paths bypass the
    /// registered directories.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        let mut file = PathBuf::from(name);
        if file.extension().is_none() {
            file.set_extension("png");
        }

        if file.is_absolute() {
            return if file.is_file() {
                Ok(file)
            } else {
                Err(Error::template_not_found(name, &[] as &[PathBuf]))
            };
        }

        self.dirs
            .iter()
            .map(|dir| dir.join(&file))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| Error::template_not_found(name, &self.dirs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_resolve_first_match_wins() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        std::fs::write(second.path().join("Back.png"), b"png").unwrap();
        std::fs::write(first.path().join("Logout.png"), b"png").unwrap();
        std::fs::write(second.path().join("Logout.png"), b"png").unwrap();

        let mut images = ImagePath::new();
        images.add(first.path()).unwrap();
        images.add(second.path()).unwrap();

        assert_eq!(
            images.resolve("Back.png").unwrap(),
            second.path().join("Back.png")
        );
        assert_eq!(
            images.resolve("Logout.png").unwrap(),
            first.path().join("Logout.png")
        );
    }

    #[test]
    fn test_resolve_appends_png() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("Email.png"), b"png").unwrap();

        let mut images = ImagePath::new();
        images.add(dir.path()).unwrap();
        assert_eq!(images.resolve("Email").unwrap(), dir.path().join("Email.png"));
    }

    #[test]
    fn test_missing_template_lists_dirs() {
        let dir = tempdir().unwrap();
        let mut images = ImagePath::new();
        images.add(dir.path()).unwrap();

        let err = images.resolve("Settings.png").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Settings.png"));
        assert!(msg.contains(&dir.path().display().to_string()));
    }

    #[test]
    fn test_add_rejects_missing_dir_and_dedups() {
        let dir = tempdir().unwrap();
        let mut images = ImagePath::new();
        assert!(images.add(&dir.path().join("missing")).is_err());

        images.add(dir.path()).unwrap();
        images.add(dir.path()).unwrap();
        assert_eq!(images.dirs().len(), 1);
    }
}

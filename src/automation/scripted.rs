//! In-memory screen
//!
//! Answers lookups from a script instead of pixels and records every call,
//! so scenarios can be exercised without a display. Templates are visible
//! immediately unless configured otherwise.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::{ImagePath, Key, Lookup, Region, Screen};
use crate::common::{Error, Result};

/// One recorded call on a [`ScriptedScreen`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    AddImagePath(PathBuf),
    Open(PathBuf),
    Close,
    Locate(String),
    /// Click on the region last reported for this template
    Click(String),
    Type(String),
    Key(Key),
    Screenshot(PathBuf),
}

impl Action {
    /// Everything except image path registration and lookups
    pub fn is_ui(&self) -> bool {
        !matches!(self, Action::AddImagePath(_) | Action::Locate(_))
    }
}

#[derive(Debug, Clone, Copy)]
enum Visibility {
    /// Not found for this many lookups, found afterwards
    After(usize),
    Never,
}

/// Screen driven by canned answers
#[derive(Debug, Default)]
pub struct ScriptedScreen {
    index: usize,
    strict: bool,
    images: ImagePath,
    visibility: HashMap<String, Visibility>,
    attempts: HashMap<String, usize>,
    regions: HashMap<String, Region>,
    actions: Vec<Action>,
}

impl ScriptedScreen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Screen that also checks every image path, template and binary exists
    /// on disk
    pub fn strict(index: usize) -> Self {
        Self {
            index,
            strict: true,
            ..Self::default()
        }
    }

    /// The template is never found
    pub fn missing(mut self, template: &str) -> Self {
        self.visibility
            .insert(template.to_string(), Visibility::Never);
        self
    }

    /// The template is found on lookup number `attempts + 1`
    pub fn visible_after(mut self, template: &str, attempts: usize) -> Self {
        self.visibility
            .insert(template.to_string(), Visibility::After(attempts));
        self
    }

    /// Recorded calls, in order
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Recorded calls that would have touched the application
    pub fn ui_actions(&self) -> Vec<&Action> {
        self.actions.iter().filter(|a| a.is_ui()).collect()
    }

    /// Number of lookups made for `template`
    pub fn lookups(&self, template: &str) -> usize {
        self.attempts.get(template).copied().unwrap_or(0)
    }

    /// Template whose last reported region is `region`
    fn template_at(&self, region: Region) -> String {
        self.regions
            .iter()
            .find(|(_, r)| **r == region)
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| region.to_string())
    }

    /// Stable, distinct region per template
    fn region_for(&mut self, template: &str) -> Region {
        let next = self.regions.len() as i32;
        *self
            .regions
            .entry(template.to_string())
            .or_insert_with(|| Region::new(10 + next * 40, 10 + next * 30, 32, 16))
    }
}

impl Screen for ScriptedScreen {
    fn index(&self) -> usize {
        self.index
    }

    fn add_image_path(&mut self, dir: &Path) -> Result<()> {
        if self.strict {
            self.images.add(dir)?;
        }
        self.actions.push(Action::AddImagePath(dir.to_path_buf()));
        Ok(())
    }

    fn open_app(&mut self, binary: &Path) -> Result<()> {
        if self.strict && !binary.is_file() {
            return Err(Error::LaunchFailed {
                path: binary.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            });
        }
        tracing::debug!(binary = %binary.display(), "Scripted open");
        self.actions.push(Action::Open(binary.to_path_buf()));
        Ok(())
    }

    fn close_app(&mut self) -> Result<()> {
        self.actions.push(Action::Close);
        Ok(())
    }

    fn locate(&mut self, template: &str) -> Result<Lookup> {
        if self.strict {
            self.images.resolve(template)?;
        }
        self.actions.push(Action::Locate(template.to_string()));

        let attempt = self.attempts.entry(template.to_string()).or_insert(0);
        *attempt += 1;
        let attempt = *attempt;

        let visible = match self.visibility.get(template) {
            None => true,
            Some(Visibility::Never) => false,
            Some(Visibility::After(n)) => attempt > *n,
        };

        if visible {
            Ok(Lookup::Found(self.region_for(template)))
        } else {
            Ok(Lookup::NotFound)
        }
    }

    fn click(&mut self, region: Region) -> Result<()> {
        let target = self.template_at(region);
        self.actions.push(Action::Click(target));
        Ok(())
    }

    fn type_text(&mut self, text: &str) -> Result<()> {
        self.actions.push(Action::Type(text.to_string()));
        Ok(())
    }

    fn send_key(&mut self, key: Key) -> Result<()> {
        self.actions.push(Action::Key(key));
        Ok(())
    }

    fn screenshot(&mut self, path: &Path) -> Result<()> {
        self.actions.push(Action::Screenshot(path.to_path_buf()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_after_attempts() {
        let mut screen = ScriptedScreen::new().visible_after("Please_connect.png", 2);
        assert_eq!(screen.locate("Please_connect.png").unwrap(), Lookup::NotFound);
        assert_eq!(screen.locate("Please_connect.png").unwrap(), Lookup::NotFound);
        assert!(screen.locate("Please_connect.png").unwrap().is_found());
        assert_eq!(screen.lookups("Please_connect.png"), 3);
    }

    #[test]
    fn test_click_records_template() {
        let mut screen = ScriptedScreen::new();
        let back = screen.locate("Back.png").unwrap().found().unwrap();
        let settings = screen.locate("Settings.png").unwrap().found().unwrap();
        assert_ne!(back, settings);

        screen.click(settings).unwrap();
        screen.click(back).unwrap();
        assert_eq!(
            screen.ui_actions(),
            vec![
                &Action::Click("Settings.png".to_string()),
                &Action::Click("Back.png".to_string())
            ]
        );
    }

    #[test]
    fn test_missing_never_found() {
        let mut screen = ScriptedScreen::new().missing("Logout.png");
        for _ in 0..5 {
            assert_eq!(screen.locate("Logout.png").unwrap(), Lookup::NotFound);
        }
    }

    #[test]
    fn test_strict_checks_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Email.png"), b"png").unwrap();

        let mut screen = ScriptedScreen::strict(0);
        assert!(screen.add_image_path(&dir.path().join("nope")).is_err());
        assert!(matches!(
            screen.open_app(&dir.path().join("app")),
            Err(Error::LaunchFailed { .. })
        ));
        screen.add_image_path(dir.path()).unwrap();
        assert!(screen.locate("Email.png").unwrap().is_found());
        assert!(screen.locate("Back.png").is_err());
    }
}

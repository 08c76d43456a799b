//! Screen automation
//!
//! The runner talks to the display through the [`Screen`] trait: find a
//! template, click a region, type text. Two implementations exist:
//! [`desktop::DesktopScreen`] drives the real monitor, mouse and keyboard
//! (feature `desktop`), and [`scripted::ScriptedScreen`] answers from a
//! script for tests and dry runs.

pub mod app;
#[cfg(feature = "desktop")]
pub mod desktop;
pub mod frame;
pub mod images;
pub mod matcher;
pub mod scripted;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::common::config::Config;
use crate::common::{Error, Result};

pub use images::ImagePath;
pub use scripted::ScriptedScreen;

/// A rectangle in global screen coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Point a click on this region lands on
    pub fn center(&self) -> (i32, i32) {
        (
            self.x + (self.width / 2) as i32,
            self.y + (self.height / 2) as i32,
        )
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} at ({}, {})",
            self.width, self.height, self.x, self.y
        )
    }
}

/// Outcome of a single lookup of a template on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Found(Region),
    NotFound,
}

impl Lookup {
    pub fn found(self) -> Option<Region> {
        match self {
            Lookup::Found(region) => Some(region),
            Lookup::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

/// Keys a scenario can press
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Tab,
    Enter,
    Escape,
    Backspace,
    Delete,
    Space,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
}

impl Key {
    pub fn name(&self) -> &'static str {
        match self {
            Key::Tab => "tab",
            Key::Enter => "enter",
            Key::Escape => "escape",
            Key::Backspace => "backspace",
            Key::Delete => "delete",
            Key::Space => "space",
            Key::Up => "up",
            Key::Down => "down",
            Key::Left => "left",
            Key::Right => "right",
            Key::Home => "home",
            Key::End => "end",
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Key {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let key = match s.to_ascii_lowercase().as_str() {
            "tab" => Key::Tab,
            "enter" | "return" => Key::Enter,
            "escape" | "esc" => Key::Escape,
            "backspace" => Key::Backspace,
            "delete" | "del" => Key::Delete,
            "space" => Key::Space,
            "up" => Key::Up,
            "down" => Key::Down,
            "left" => Key::Left,
            "right" => Key::Right,
            "home" => Key::Home,
            "end" => Key::End,
            _ => return Err(Error::Config(format!("Unknown key: {}", s))),
        };
        Ok(key)
    }
}

/// A display that templates can be searched on and input sent to
///
/// Every call blocks until the backend has finished it. `locate` makes one
/// attempt; waiting is the runner's job.
pub trait Screen {
    /// Index of the display this handle drives
    fn index(&self) -> usize;

    /// Register a directory that template names are resolved against
    fn add_image_path(&mut self, dir: &Path) -> Result<()>;

    /// Launch the application, or attach to an instance already running
    /// it; does not wait for its window
    fn open_app(&mut self, binary: &Path) -> Result<()>;

    /// Shut the application down, forcibly if it does not exit in time
    fn close_app(&mut self) -> Result<()>;

    /// Search the current screen contents once for `template`
    fn locate(&mut self, template: &str) -> Result<Lookup>;

    fn click(&mut self, region: Region) -> Result<()>;

    fn type_text(&mut self, text: &str) -> Result<()>;

    fn send_key(&mut self, key: Key) -> Result<()>;

    /// Save the current screen contents as a PNG
    fn screenshot(&mut self, path: &Path) -> Result<()>;
}

/// Open the screen the run should drive
///
/// `dry_run` gives a strict [`ScriptedScreen`] on which every template is
/// visible, so a scenario can be checked without touching the desktop.
pub fn open_screen(config: &Config, dry_run: bool) -> Result<Box<dyn Screen>> {
    if dry_run {
        tracing::info!("Dry run: no application is launched and no input is sent");
        return Ok(Box::new(ScriptedScreen::strict(config.screen.index)));
    }
    open_desktop(config)
}

#[cfg(feature = "desktop")]
fn open_desktop(config: &Config) -> Result<Box<dyn Screen>> {
    let screen = desktop::DesktopScreen::new(config)?;
    Ok(Box::new(screen))
}

#[cfg(not(feature = "desktop"))]
fn open_desktop(_config: &Config) -> Result<Box<dyn Screen>> {
    Err(Error::BackendUnavailable)
}

//! Real desktop backend
//!
//! Captures one monitor with `xcap`, finds templates with
//! [`matcher`](super::matcher), and injects mouse and keyboard input with
//! `enigo`. Once the application's window is known, lookups and
//! screenshots only cover that window. Processes are found and stopped
//! through `sysinfo`.

use std::collections::HashMap;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use enigo::{Button, Coordinate, Direction, Enigo, Keyboard, Mouse};
use image::{GrayImage, Rgba, RgbaImage};
use sysinfo::{Pid, ProcessRefreshKind, RefreshKind, Signal, System, UpdateKind};
use xcap::{Monitor, Window};

use super::app::{self, WindowInfo, WindowMatcher};
use super::frame::Frame;
use super::{ImagePath, Key, Lookup, Region, Screen};
use crate::common::config::Config;
use crate::common::{Error, Result};

const CLOSE_POLL: Duration = Duration::from_millis(100);

/// The application under test
struct RunningApp {
    pid: u32,
    /// Set when we started it
    child: Option<Child>,
}

/// One physical display plus the input devices
pub struct DesktopScreen {
    index: usize,
    monitor: Monitor,
    confidence: f32,
    images: ImagePath,
    templates: HashMap<String, GrayImage>,
    enigo: Enigo,
    window: WindowMatcher,
    reuse_running: bool,
    close_wait: Duration,
    app: Option<RunningApp>,
}

fn backend(what: &str) -> impl FnOnce(xcap::XCapError) -> Error + '_ {
    move |e| Error::Backend(format!("{}: {}", what, e))
}

impl DesktopScreen {
    pub fn new(config: &Config) -> Result<Self> {
        let index = config.screen.index;
        let mut monitors = Monitor::all().map_err(backend("Listing monitors failed"))?;
        let available = monitors.len();
        if index >= available {
            return Err(Error::ScreenNotFound { index, available });
        }
        let monitor = monitors.swap_remove(index);

        let enigo = Enigo::new(&enigo::Settings::default())
            .map_err(|e| Error::Backend(format!("Input connection failed: {}", e)))?;

        tracing::info!(
            screen = index,
            x = monitor.x().unwrap_or_default(),
            y = monitor.y().unwrap_or_default(),
            width = monitor.width().unwrap_or_default(),
            height = monitor.height().unwrap_or_default(),
            "Opened screen"
        );

        Ok(Self {
            index,
            monitor,
            confidence: config.matching.confidence,
            images: ImagePath::new(),
            templates: HashMap::new(),
            enigo,
            window: WindowMatcher::new(config.window.title.clone(), config.window.app_name.clone()),
            reuse_running: config.window.reuse_running,
            close_wait: config.window.close_wait(),
            app: None,
        })
    }

    /// Whole monitor, with pixels mapped to desktop points
    fn capture(&self) -> Result<Frame<Rgba<u8>>> {
        let raw = self
            .monitor
            .capture_image()
            .map_err(backend("Screen capture failed"))?;
        let (width, height) = (raw.width(), raw.height());
        let image = RgbaImage::from_raw(width, height, raw.into_raw())
            .ok_or_else(|| Error::Backend("Screen capture returned a short buffer".to_string()))?;

        let origin = (
            self.monitor.x().map_err(backend("Monitor position"))?,
            self.monitor.y().map_err(backend("Monitor position"))?,
        );
        let points_wide = self.monitor.width().map_err(backend("Monitor size"))?;
        Ok(Frame::of_monitor(image, origin, points_wide))
    }

    /// Application window bounds, if one is configured and showing
    fn window_bounds(&self) -> Result<Option<Region>> {
        let windows = Window::all()
            .map_err(backend("Listing windows failed"))?
            .iter()
            .filter_map(window_info)
            .collect::<Vec<_>>();
        Ok(app::pick_window(&self.window, &windows).map(|w| w.bounds))
    }

    /// What lookups should search; `None` while the window has not appeared
    fn view(&self) -> Result<Option<Frame<Rgba<u8>>>> {
        let frame = self.capture()?;
        if self.window.is_empty() {
            return Ok(Some(frame));
        }

        let Some(bounds) = self.window_bounds()? else {
            tracing::trace!(matcher = ?self.window, "Application window not found yet");
            return Ok(None);
        };
        let cropped = frame.crop(bounds);
        if cropped.is_none() {
            tracing::debug!(%bounds, screen = self.index, "Application window is not on this screen");
        }
        Ok(cropped)
    }

    /// Decoded grayscale template, loaded on first use
    fn template(&mut self, name: &str) -> Result<&GrayImage> {
        if !self.templates.contains_key(name) {
            let path = self.images.resolve(name)?;
            let image = image::open(&path)
                .map_err(|e| Error::image_load(&path, e))?
                .to_luma8();
            tracing::debug!(template = name, path = %path.display(), "Loaded template");
            self.templates.insert(name.to_string(), image);
        }
        self.templates
            .get(name)
            .ok_or_else(|| Error::template_not_found(name, self.images.dirs()))
    }

    fn attach(&mut self, pid: u32, child: Option<Child>) {
        self.window.pid = Some(pid);
        self.app = Some(RunningApp { pid, child });
    }
}

/// Window as the matcher sees it; windows that cannot be queried are skipped
fn window_info(window: &Window) -> Option<WindowInfo> {
    Some(WindowInfo {
        pid: window.pid().ok()?,
        title: window.title().ok()?,
        app_name: window.app_name().ok()?,
        bounds: Region::new(
            window.x().ok()?,
            window.y().ok()?,
            window.width().ok()?,
            window.height().ok()?,
        ),
        minimized: window.is_minimized().ok()?,
    })
}

fn processes() -> System {
    System::new_with_specifics(
        RefreshKind::new().with_processes(ProcessRefreshKind::new().with_exe(UpdateKind::OnlyIfNotSet)),
    )
}

impl Screen for DesktopScreen {
    fn index(&self) -> usize {
        self.index
    }

    fn add_image_path(&mut self, dir: &Path) -> Result<()> {
        self.images.add(dir)
    }

    fn open_app(&mut self, binary: &Path) -> Result<()> {
        if self.reuse_running {
            let system = processes();
            let running = app::running_pid(
                binary,
                system.processes().iter().map(|(pid, p)| (pid.as_u32(), p.exe())),
            );
            if let Some(pid) = running {
                tracing::info!(binary = %binary.display(), pid, "Application already running");
                self.attach(pid, None);
                return Ok(());
            }
        }

        let child = Command::new(binary)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| Error::LaunchFailed {
                path: binary.to_path_buf(),
                source,
            })?;
        let pid = child.id();
        tracing::info!(binary = %binary.display(), pid, "Launched application");
        self.attach(pid, Some(child));
        Ok(())
    }

    fn close_app(&mut self) -> Result<()> {
        let Some(mut app) = self.app.take() else {
            tracing::debug!("No application to close");
            return Ok(());
        };
        self.window.pid = None;

        let pid = Pid::from_u32(app.pid);
        let mut system = processes();
        let Some(process) = system.process(pid) else {
            tracing::info!(pid = app.pid, "Application already exited");
            return Ok(());
        };
        if process.kill_with(Signal::Term) != Some(true) {
            tracing::debug!(pid = app.pid, "Graceful stop unsupported, killing");
            process.kill();
        }

        let deadline = Instant::now() + self.close_wait;
        loop {
            let exited = match app.child.as_mut() {
                Some(child) => child.try_wait()?.is_some(),
                None => !system.refresh_process(pid),
            };
            if exited {
                tracing::info!(pid = app.pid, "Application closed");
                return Ok(());
            }
            if Instant::now() >= deadline {
                break;
            }
            std::thread::sleep(CLOSE_POLL);
        }

        tracing::warn!(pid = app.pid, wait = ?self.close_wait, "Application still running, killing");
        match app.child.as_mut() {
            Some(child) => {
                child.kill()?;
                child.wait()?;
            }
            None => {
                if let Some(process) = system.process(pid) {
                    process.kill();
                }
            }
        }
        Ok(())
    }

    fn locate(&mut self, template: &str) -> Result<Lookup> {
        let Some(view) = self.view()? else {
            return Ok(Lookup::NotFound);
        };
        let view = view.to_gray();
        let confidence = self.confidence;
        let needle = self.template(template)?;

        match view.locate(template, needle, confidence)? {
            None => Ok(Lookup::NotFound),
            Some((region, hit)) => {
                tracing::debug!(template, score = hit.score, scale = view.scale(), %region, "Template found");
                Ok(Lookup::Found(region))
            }
        }
    }

    fn click(&mut self, region: Region) -> Result<()> {
        let (x, y) = region.center();
        self.enigo
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(|e| Error::Backend(format!("Mouse move failed: {}", e)))?;
        self.enigo
            .button(Button::Left, Direction::Click)
            .map_err(|e| Error::Backend(format!("Mouse click failed: {}", e)))
    }

    fn type_text(&mut self, text: &str) -> Result<()> {
        self.enigo
            .text(text)
            .map_err(|e| Error::Backend(format!("Typing failed: {}", e)))
    }

    fn send_key(&mut self, key: Key) -> Result<()> {
        self.enigo
            .key(enigo_key(key), Direction::Click)
            .map_err(|e| Error::Backend(format!("Key '{}' failed: {}", key, e)))
    }

    fn screenshot(&mut self, path: &Path) -> Result<()> {
        // Fall back to the whole monitor when the window is not showing
        let frame = match self.view()? {
            Some(view) => view,
            None => self.capture()?,
        };
        frame
            .image
            .save(path)
            .map_err(|e| Error::Backend(format!("Saving '{}' failed: {}", path.display(), e)))
    }
}

fn enigo_key(key: Key) -> enigo::Key {
    match key {
        Key::Tab => enigo::Key::Tab,
        Key::Enter => enigo::Key::Return,
        Key::Escape => enigo::Key::Escape,
        Key::Backspace => enigo::Key::Backspace,
        Key::Delete => enigo::Key::Delete,
        Key::Space => enigo::Key::Space,
        Key::Up => enigo::Key::UpArrow,
        Key::Down => enigo::Key::DownArrow,
        Key::Left => enigo::Key::LeftArrow,
        Key::Right => enigo::Key::RightArrow,
        Key::Home => enigo::Key::Home,
        Key::End => enigo::Key::End,
    }
}

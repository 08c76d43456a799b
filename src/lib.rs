//! visual-robot - image-template driven UI scenarios
//!
//! Locates UI elements on screen by matching reference images, clicks and
//! types through a scripted scenario, and asserts the screens that should
//! appear along the way.

pub mod automation;
pub mod cli;
pub mod commands;
pub mod common;
pub mod testing;

// Re-export commonly used types for tests
pub use automation::{Key, Lookup, Region, Screen};
pub use common::{EnvFile, Error, Result};

//! Common utilities shared by the CLI, the runner and the backends

pub mod config;
pub mod env;
pub mod error;
pub mod logging;
pub mod paths;

pub use env::EnvFile;
pub use error::{Error, Result};

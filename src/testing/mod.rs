//! Scenario runner
//!
//! Runs UI scenarios against a [`Screen`]: the built-in login scenario, or
//! any scenario described in a YAML file. Configuration problems are
//! returned as errors before the application is touched; step failures end
//! the run and are reported in the [`TestResult`].

mod config;
pub mod login;
mod runner;

use std::path::Path;

use colored::Colorize;

pub use config::*;
pub use login::{run_login, LoginConfig, LoginOptions};
pub use runner::{run_steps, RunOptions, Step, TestResult};

use crate::automation::Screen;
use crate::common::config::Config;
use crate::common::{paths, EnvFile, Result};

/// Run a test scenario from a YAML file
///
/// Templates come from the scenario's `images` directory, or
/// `default_images` when it has none. The env file is only read when a step
/// uses a `${KEY}` placeholder.
pub async fn run_scenario(
    screen: &mut dyn Screen,
    path: &Path,
    env_file: &Path,
    default_images: &Path,
    config: &Config,
    run: &RunOptions,
) -> Result<TestResult> {
    let scenario = TestScenario::load(path)?;
    let scenario_dir = path.parent().unwrap_or(Path::new("."));

    let images = match &scenario.images {
        Some(images) => paths::resolve_relative(scenario_dir, images),
        None => default_images.to_path_buf(),
    };
    screen.add_image_path(&images)?;

    let env = if scenario.uses_env() {
        EnvFile::load(env_file)?
    } else {
        EnvFile::parse(env_file, "")?
    };
    let steps = scenario.resolve_steps(&env, scenario_dir)?;

    if !run.quiet {
        if let Some(desc) = &scenario.description {
            println!("\n  {}", desc.dimmed());
        }
    }

    Ok(run_steps(screen, &scenario.name, &steps, &config.timeouts, run).await)
}

//! CLI command dispatch
//!
//! Turns parsed commands into runs. Each command reports whether it passed;
//! errors are returned to `main`, which prints them and exits non-zero.

use std::path::Path;

use colored::Colorize;

use crate::automation::frame::Frame;
use crate::automation::{self, Screen};
use crate::commands::{Commands, TargetArgs};
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::testing::{self, LoginOptions, RunOptions, TestResult};

/// Dispatch a CLI command; `Ok(false)` means the run failed
pub async fn dispatch(command: Commands, mut config: Config) -> Result<bool> {
    match command {
        Commands::Run { images, target } => {
            apply_target(&mut config, &target);
            let mut options = LoginOptions::from_config(&config);
            if let Some(env) = &target.env {
                options.env_file = env.clone();
            }
            if let Some(images) = images {
                options.images = images;
            }

            let mut screen = automation::open_screen(&config, target.dry_run)?;
            let run = run_options(&target);
            let result = testing::run_login(screen.as_mut(), &options, &config, &run).await?;
            report(&result, &target)
        }

        Commands::Test { path, target } => {
            apply_target(&mut config, &target);
            let env_file = target.env.clone().unwrap_or_else(|| config.paths.env_file.clone());

            let mut screen: Box<dyn Screen> = automation::open_screen(&config, target.dry_run)?;
            let run = run_options(&target);
            let result = testing::run_scenario(
                screen.as_mut(),
                &path,
                &env_file,
                &config.paths.images,
                &config,
                &run,
            )
            .await?;
            report(&result, &target)
        }

        Commands::Locate {
            screenshot,
            template,
            confidence,
        } => {
            let confidence = confidence.unwrap_or(config.matching.confidence);
            locate(&screenshot, &template, confidence)
        }
    }
}

fn apply_target(config: &mut Config, target: &TargetArgs) {
    if let Some(index) = target.screen {
        config.screen.index = index;
    }
}

fn run_options(target: &TargetArgs) -> RunOptions {
    let mut run = RunOptions::new(&target.test_id);
    run.verbose = target.verbose;
    run.quiet = target.json;
    if let Some(dir) = &target.screenshot_dir {
        run.screenshot_dir = dir.join(&target.test_id);
    }
    run
}

fn report(result: &TestResult, target: &TargetArgs) -> Result<bool> {
    if target.json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else if let Some(error) = &result.error {
        eprintln!(
            "{} stopped at step {}/{}: {}",
            result.name, result.steps_run, result.steps_total, error
        );
    }
    Ok(result.passed)
}

fn locate(screenshot: &Path, template: &Path, confidence: f32) -> Result<bool> {
    if !(0.0..=1.0).contains(&confidence) {
        return Err(Error::Config(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            confidence
        )));
    }

    let screen = image::open(screenshot)
        .map_err(|e| Error::image_load(screenshot, e))?
        .to_luma8();
    let needle = image::open(template)
        .map_err(|e| Error::image_load(template, e))?
        .to_luma8();
    let name = template.display().to_string();

    match Frame::new(screen, (0, 0), 1.0).locate(&name, &needle, confidence)? {
        Some((region, hit)) => {
            println!(
                "{} {} at {} (score {:.3})",
                "Found".green().bold(),
                name,
                region,
                hit.score
            );
            Ok(true)
        }
        None => {
            println!("{} {} (confidence {})", "Not found:".red().bold(), name, confidence);
            Ok(false)
        }
    }
}

//! visual-robot - image-template driven UI scenarios
//!
//! Finds UI elements on screen by comparing against reference images, then
//! clicks and types to walk an application through a scripted scenario.

use clap::Parser;
use std::path::PathBuf;
use visual_robot::commands::Commands;
use visual_robot::common::config::Config;
use visual_robot::{cli, common};

#[derive(Parser)]
#[command(name = "visual-robot", about = "Image-template driven UI scenario runner")]
#[command(version, long_about = None)]
struct Cli {
    /// Settings file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also append logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let verbose = match &cli.command {
        Commands::Run { target, .. } | Commands::Test { target, .. } => target.verbose,
        Commands::Locate { .. } => false,
    };
    let log_guard = common::logging::init_cli(verbose, cli.log_file.as_deref());

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };

    let result = match config {
        Ok(config) => cli::dispatch(cli.command, config).await,
        Err(e) => Err(e),
    };

    let code = match result {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            tracing::debug!(config_error = e.is_config(), "Run aborted");
            eprintln!("Error: {e}");
            1
        }
    };

    // Flush the log file before exiting
    drop(log_guard);
    std::process::exit(code);
}

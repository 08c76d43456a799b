//! CLI command definitions
//!
//! Defines the clap commands for the visual-robot CLI.

use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run the built-in login, game center and logout scenario
    Run {
        /// Directory holding the template images (default: paths.images setting)
        #[arg(long)]
        images: Option<PathBuf>,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Run a YAML test scenario
    Test {
        /// Path to the YAML test scenario file
        path: PathBuf,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Find a template in a saved screenshot
    Locate {
        /// Screenshot to search
        screenshot: PathBuf,

        /// Template image to look for
        template: PathBuf,

        /// Minimum match score (default: matching.confidence setting)
        #[arg(long)]
        confidence: Option<f32>,
    },
}

/// Options shared by the commands that drive a screen
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Env file with BINARY_PATH, USER and PASSWORD (default: paths.env_file setting)
    #[arg(long)]
    pub env: Option<PathBuf>,

    /// Monitor index to drive (default: screen.index setting)
    #[arg(long)]
    pub screen: Option<usize>,

    /// Identifier for this run's screenshot directory
    #[arg(long, default_value = "default")]
    pub test_id: String,

    /// Write screenshots here instead of the per-user data directory
    #[arg(long)]
    pub screenshot_dir: Option<PathBuf>,

    /// Walk the scenario against a simulated screen instead of the desktop
    #[arg(long)]
    pub dry_run: bool,

    /// Print the result as JSON instead of the step report
    #[arg(long)]
    pub json: bool,

    /// Verbose output
    #[arg(long, short)]
    pub verbose: bool,
}

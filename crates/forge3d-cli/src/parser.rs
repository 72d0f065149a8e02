//! Main CLI parser and top-level argument handling.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Set up the local image-to-3D toolchain and run generations.
#[derive(Parser)]
#[command(name = "forge3d")]
#[command(about = "Install, diagnose and run a local image-to-3D generator")]
#[command(version)]
pub struct Cli {
    /// Project root holding the venv, scripts and repository checkout
    #[arg(long = "project-root", global = true, env = "FORGE3D_PROJECT_ROOT")]
    pub project_root: Option<PathBuf>,

    /// Interpreter to try before any discovered one
    #[arg(long, global = true, env = "FORGE3D_PYTHON")]
    pub interpreter: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

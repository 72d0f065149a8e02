//! Commands enum and their argument structs.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};
use forge3d_core::{InstallationMode, MeshFormat};

use crate::config_commands::ConfigCommand;

/// Available forge3d commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Probe the machine and print what was found
    Check {
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Install the accelerator stack, dependencies, generator and native extensions
    Install(InstallArgs),

    /// Install a single package into the selected interpreter
    InstallPackage {
        /// Requirement, e.g. "trimesh>=4"
        spec: String,
        /// Module name to import-check, when it differs from the package name
        #[arg(long)]
        import_name: Option<String>,
        /// Override the configured installation mode for index selection
        #[arg(long)]
        mode: Option<InstallationMode>,
    },

    /// Import-check every dependency group without changing anything
    Diagnose {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Convert an image (or a folder of images) into a mesh
    Generate(GenerateArgs),

    /// Strip backgrounds from a folder of images before generation
    RemoveBackground {
        /// Folder of images
        input: PathBuf,

        /// Output directory; defaults to `<input>_no_background`
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show or change persisted settings
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// How native-extension build failures are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum RecoveryChoice {
    /// Skip any extension that fails to build
    #[default]
    Skip,
    /// Apply the automated fix for each failure class
    Auto,
    /// Ask on the terminal for each failure
    Interactive,
}

#[derive(Debug, Args)]
pub struct InstallArgs {
    /// Installation mode (auto, cpu, cuda11, cuda12); defaults to the setting
    #[arg(long)]
    pub mode: Option<InstallationMode>,

    /// What to do when a native extension fails to build
    #[arg(long, value_enum, default_value_t = RecoveryChoice::Skip)]
    pub recovery: RecoveryChoice,

    /// Keep going when a required group fails; the final import check decides
    #[arg(long)]
    pub best_effort: bool,

    /// Prefer uv over pip when both are available
    #[arg(long)]
    pub uv: bool,
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Image file or folder of images
    pub input: PathBuf,

    /// Output directory; defaults to the setting, then `<project>/output`
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Mesh format (obj, glb, ply, stl, fbx)
    #[arg(long)]
    pub file_type: Option<MeshFormat>,

    #[arg(long)]
    pub steps: Option<u32>,

    #[arg(long)]
    pub guidance_scale: Option<f32>,

    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long)]
    pub octree_resolution: Option<u32>,

    /// cuda or cpu; derived from the toolkit when omitted
    #[arg(long)]
    pub device: Option<String>,

    /// Shape only, skip texturing
    #[arg(long)]
    pub disable_texture: bool,

    #[arg(long)]
    pub low_vram: bool,
}

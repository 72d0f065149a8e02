//! Path utilities for forge3d configuration and project locations.
//!
//! - Config root and settings file location
//! - Project root and generator repository defaults
//! - User path normalization (`~` expansion, absolutization)
//!
//! No terminal I/O here; adapters handle prompts.

mod error;
mod platform;

pub use error::PathError;
pub use platform::{
    CONFIG_DIR_ENV, REPO_DIR_NAME, config_root, config_root_from, default_project_root,
    default_repo_dir, ensure_directory, normalize_user_path, settings_path,
};

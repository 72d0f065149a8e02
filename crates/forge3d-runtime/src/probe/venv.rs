//! Virtual environment discovery.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

/// Directory names tried under each base directory.
pub const VENV_DIR_NAMES: &[&str] = &["venv", ".venv", "env"];

/// Library whose presence marks a venv as usable.
pub const VENV_MARKER_PACKAGE: &str = "torch";

/// A usable virtual environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualEnv {
    pub root: PathBuf,
    pub interpreter: PathBuf,
}

/// Interpreter inside a venv root.
pub fn venv_python(root: &Path) -> PathBuf {
    if cfg!(windows) {
        root.join("Scripts").join("python.exe")
    } else {
        let bin = root.join("bin");
        let python3 = bin.join("python3");
        if python3.exists() {
            python3
        } else {
            bin.join("python")
        }
    }
}

/// `site-packages` directories of a venv (one per Python minor on Unix).
fn site_packages_dirs(root: &Path) -> Vec<PathBuf> {
    if cfg!(windows) {
        return vec![root.join("Lib").join("site-packages")];
    }
    let mut dirs: Vec<PathBuf> = ["lib", "lib64"]
        .iter()
        .filter_map(|lib| fs::read_dir(root.join(lib)).ok())
        .flat_map(|entries| entries.filter_map(Result::ok))
        .filter(|e| e.file_name().to_string_lossy().starts_with("python"))
        .map(|e| e.path().join("site-packages"))
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    dirs
}

fn has_marker(root: &Path) -> bool {
    site_packages_dirs(root)
        .iter()
        .any(|sp| sp.join(VENV_MARKER_PACKAGE).is_dir())
}

/// Candidate roots in priority order: each base, each name.
pub fn venv_candidates(bases: &[&Path]) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for base in bases {
        for name in VENV_DIR_NAMES {
            let candidate = base.join(name);
            if !out.contains(&candidate) {
                out.push(candidate);
            }
        }
    }
    out
}

/// First candidate with an interpreter file and the marker package.
///
/// A venv with an interpreter but no marker is reported as incomplete and
/// skipped.
pub fn find_virtual_env(bases: &[&Path]) -> Option<VirtualEnv> {
    for root in venv_candidates(bases) {
        if !root.is_dir() {
            continue;
        }
        let interpreter = venv_python(&root);
        if !interpreter.is_file() {
            debug!(venv = %root.display(), "Directory has no interpreter, ignoring");
            continue;
        }
        if !has_marker(&root) {
            info!(
                venv = %root.display(),
                marker = VENV_MARKER_PACKAGE,
                "Found virtual environment but it is incomplete, not selecting it"
            );
            continue;
        }
        debug!(venv = %root.display(), "Selected virtual environment");
        return Some(VirtualEnv { root, interpreter });
    }
    None
}

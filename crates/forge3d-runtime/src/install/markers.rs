//! Package-manager transcript markers.

use forge3d_core::PackageManager;

/// What a package-manager transcript says happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallVerdict {
    Succeeded,
    AlreadySatisfied,
    Failed,
    /// No marker at all. The status is left alone.
    Ambiguous,
}

impl InstallVerdict {
    /// Worth confirming with a show-check.
    pub const fn claims_installed(self) -> bool {
        matches!(self, Self::Succeeded | Self::AlreadySatisfied)
    }
}

struct Markers {
    success: &'static str,
    already: &'static str,
    error: &'static str,
}

const fn markers(manager: PackageManager) -> Markers {
    match manager {
        PackageManager::Pip => Markers {
            success: "Successfully installed",
            already: "Requirement already satisfied",
            error: "ERROR:",
        },
        PackageManager::Uv => Markers {
            success: "Installed ",
            already: "Audited ",
            error: "error:",
        },
    }
}

/// Classify an install transcript.
///
/// A success marker wins over an error marker (pip reports resolver
/// warnings as `ERROR:` after a successful install); an error marker wins
/// over "already satisfied", which pip also prints for dependencies of a
/// requirement it then fails to find.
pub fn classify_install(manager: PackageManager, output: &str) -> InstallVerdict {
    let m = markers(manager);
    if output.contains(m.success) {
        InstallVerdict::Succeeded
    } else if output.contains(m.error) {
        InstallVerdict::Failed
    } else if output.contains(m.already) {
        InstallVerdict::AlreadySatisfied
    } else {
        InstallVerdict::Ambiguous
    }
}

/// Whether a `pip show` / `uv pip show` transcript lists the package.
pub fn show_lists_package(output: &str) -> bool {
    output.lines().any(|l| l.starts_with("Name:"))
}

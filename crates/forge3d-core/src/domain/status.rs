//! Per-package dependency status and the session status map.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::dependency::bare_package_name;

/// Status of one package in the active environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DependencyStatus {
    #[default]
    NotChecked,
    Checking,
    Installed,
    NotInstalled,
    Error,
}

impl DependencyStatus {
    /// Position in the `NotChecked -> Checking -> terminal` progression.
    const fn rank(self) -> u8 {
        match self {
            Self::NotChecked => 0,
            Self::Checking => 1,
            Self::Installed | Self::NotInstalled | Self::Error => 2,
        }
    }

    pub const fn is_terminal(self) -> bool {
        self.rank() == 2
    }
}

impl fmt::Display for DependencyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotChecked => "not checked",
            Self::Checking => "checking",
            Self::Installed => "installed",
            Self::NotInstalled => "not installed",
            Self::Error => "error",
        };
        f.write_str(label)
    }
}

/// Result of applying a status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    Applied,
    Unchanged,
    /// The update would have moved the package backwards and was dropped.
    Rejected,
}

/// Status of every known package, bound to one interpreter.
///
/// Updates never regress within a session: a package only moves forward
/// through `NotChecked -> Checking -> {Installed | NotInstalled | Error}` and
/// an `Installed` package stays installed until [`StatusMap::request_recheck`]
/// is called for it. Rebinding to another environment invalidates everything.
#[derive(Debug, Clone, Default)]
pub struct StatusMap {
    environment: Option<PathBuf>,
    entries: BTreeMap<String, DependencyStatus>,
}

impl StatusMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn environment(&self) -> Option<&Path> {
        self.environment.as_deref()
    }

    /// Bind the map to the interpreter used for installs and checks.
    ///
    /// Returns `true` if the binding changed and existing entries were dropped.
    pub fn bind_environment(&mut self, interpreter: &Path) -> bool {
        if self.environment.as_deref() == Some(interpreter) {
            return false;
        }
        if !self.entries.is_empty() {
            debug!(
                from = ?self.environment,
                to = %interpreter.display(),
                dropped = self.entries.len(),
                "Environment changed, invalidating dependency statuses"
            );
        }
        self.entries.clear();
        self.environment = Some(interpreter.to_path_buf());
        true
    }

    pub fn get(&self, package: &str) -> DependencyStatus {
        self.entries
            .get(&bare_package_name(package))
            .copied()
            .unwrap_or_default()
    }

    /// Apply a status update, refusing transitions that move backwards.
    pub fn apply(&mut self, package: &str, next: DependencyStatus) -> StatusChange {
        let key = bare_package_name(package);
        let current = self.entries.get(&key).copied().unwrap_or_default();

        if current == next {
            return StatusChange::Unchanged;
        }

        let regresses = next.rank() < current.rank()
            || (current == DependencyStatus::Installed && next != DependencyStatus::Installed);
        if regresses {
            warn!(package = %key, from = %current, to = %next, "Ignoring status regression");
            return StatusChange::Rejected;
        }

        self.entries.insert(key, next);
        StatusChange::Applied
    }

    /// Explicit re-check request: the only way back to `NotChecked`.
    pub fn request_recheck(&mut self, package: &str) {
        self.entries
            .insert(bare_package_name(package), DependencyStatus::NotChecked);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.environment = None;
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, DependencyStatus)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

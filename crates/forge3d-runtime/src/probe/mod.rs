//! Read-only environment probing.
//!
//! Detects the interpreter, a usable virtual environment, the package
//! managers, a host C++ compiler and three independent accelerator signals
//! (toolkit compiler, driver, filesystem). Nothing here changes the system;
//! commands that fail or time out simply count as "absent".

mod parse;
mod venv;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use forge3d_core::{
    AcceleratorInfo, CommandRunner, CommandSpec, EnvironmentSnapshot, PROBE_TIMEOUT,
    PackageManager, ProcessError, ProcessResult, ToolkitInfo, ToolkitSource,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::process::ToolkitLocator;

pub use parse::{
    DriverReport, MIN_PYTHON, parse_interpreter_version, parse_nvcc_release, parse_nvidia_smi,
    python_major_minor,
};
pub use venv::{VENV_DIR_NAMES, VENV_MARKER_PACKAGE, VirtualEnv, find_virtual_env, venv_python};

#[cfg(windows)]
const BARE_INTERPRETERS: &[&str] = &["python", "py"];
#[cfg(not(windows))]
const BARE_INTERPRETERS: &[&str] = &["python", "python3"];

#[cfg(windows)]
const WELL_KNOWN_INTERPRETERS: &[&str] = &[
    r"C:\Python312\python.exe",
    r"C:\Python311\python.exe",
    r"C:\Python310\python.exe",
];
#[cfg(not(windows))]
const WELL_KNOWN_INTERPRETERS: &[&str] = &[
    "/usr/local/bin/python3",
    "/usr/bin/python3",
    "/opt/homebrew/bin/python3",
];

#[cfg(windows)]
const COMPILERS: &[&str] = &["cl"];
#[cfg(not(windows))]
const COMPILERS: &[&str] = &["c++", "g++", "clang++"];

/// Inputs that steer the probe.
#[derive(Debug, Clone, Default)]
pub struct ProbeConfig {
    /// Tried before any discovered interpreter.
    pub configured_interpreter: Option<PathBuf>,
    pub project_root: PathBuf,
    /// Generator repository, also searched for a venv.
    pub repo_dir: Option<PathBuf>,
}

/// A working interpreter and what it reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterInfo {
    pub path: PathBuf,
    pub version: Option<String>,
}

impl InterpreterInfo {
    /// At least [`MIN_PYTHON`]. An unreadable version gets the benefit of the doubt.
    pub fn is_supported(&self) -> bool {
        self.version
            .as_deref()
            .and_then(python_major_minor)
            .is_none_or(|v| v >= MIN_PYTHON)
    }
}

/// Probes the machine through a [`CommandRunner`].
pub struct EnvironmentProbe {
    runner: Arc<dyn CommandRunner>,
    config: ProbeConfig,
    locator: ToolkitLocator,
    cancel: CancellationToken,
}

impl EnvironmentProbe {
    pub fn new(runner: Arc<dyn CommandRunner>, config: ProbeConfig) -> Self {
        Self {
            runner,
            config,
            locator: ToolkitLocator::from_system(),
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_locator(mut self, locator: ToolkitLocator) -> Self {
        self.locator = locator;
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run a probe command. `Ok(None)` for anything but a clean exit.
    async fn probe(&self, spec: CommandSpec) -> Result<Option<ProcessResult>, ProcessError> {
        match self.runner.run(&spec, &self.cancel).await {
            Ok(result) if result.success() => Ok(Some(result)),
            Ok(result) => {
                debug!(
                    command = %spec.label,
                    exit_code = result.exit_code,
                    timed_out = result.timed_out,
                    "Probe command failed"
                );
                Ok(None)
            }
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                debug!(command = %spec.label, error = %e, "Probe command unavailable");
                Ok(None)
            }
        }
    }

    // ========================================================================
    // Interpreter and virtual environment
    // ========================================================================

    fn interpreter_candidates(&self) -> Vec<PathBuf> {
        let configured = self.config.configured_interpreter.iter().cloned();
        let bare = BARE_INTERPRETERS
            .iter()
            .filter_map(|name| which::which(name).ok());
        let well_known = WELL_KNOWN_INTERPRETERS.iter().map(PathBuf::from);

        let mut candidates: Vec<PathBuf> = Vec::new();
        for candidate in configured.chain(bare).chain(well_known) {
            if !candidates.contains(&candidate) {
                candidates.push(candidate);
            }
        }
        candidates
    }

    /// Check that `path --version` exits 0 within the probe timeout.
    pub async fn check_interpreter(
        &self,
        path: &Path,
    ) -> Result<Option<InterpreterInfo>, ProcessError> {
        let spec = CommandSpec::new(path)
            .arg("--version")
            .timeout(PROBE_TIMEOUT)
            .label("python --version");
        Ok(self.probe(spec).await?.map(|result| InterpreterInfo {
            path: path.to_path_buf(),
            version: parse_interpreter_version(&result.output),
        }))
    }

    /// First working interpreter in candidate order that is new enough.
    pub async fn detect_interpreter(&self) -> Result<Option<InterpreterInfo>, ProcessError> {
        for candidate in self.interpreter_candidates() {
            let Some(info) = self.check_interpreter(&candidate).await? else {
                continue;
            };
            if !info.is_supported() {
                warn!(
                    interpreter = %info.path.display(),
                    version = ?info.version,
                    minimum = %format!("{}.{}", MIN_PYTHON.0, MIN_PYTHON.1),
                    "Skipping interpreter older than the supported minimum"
                );
                continue;
            }
            debug!(interpreter = %info.path.display(), version = ?info.version, "Interpreter found");
            return Ok(Some(info));
        }
        Ok(None)
    }

    /// Usable venv under the project root or the repository.
    pub fn detect_virtual_env(&self) -> Option<VirtualEnv> {
        let mut bases: Vec<&Path> = vec![self.config.project_root.as_path()];
        if let Some(repo) = &self.config.repo_dir {
            bases.push(repo.as_path());
        }
        find_virtual_env(&bases)
    }

    // ========================================================================
    // Accelerator
    // ========================================================================

    /// Signal (a): `nvcc --version`.
    pub async fn probe_toolkit_compiler(&self) -> Result<Option<ToolkitInfo>, ProcessError> {
        let spec = CommandSpec::new("nvcc")
            .arg("--version")
            .timeout(PROBE_TIMEOUT)
            .toolkit_env();
        let Some(result) = self.probe(spec).await? else {
            return Ok(None);
        };
        Ok(parse_nvcc_release(&result.output).map(|version| ToolkitInfo {
            version,
            root: self.locator.locate().map(|l| l.root),
            source: ToolkitSource::Compiler,
        }))
    }

    /// Signal (b): `nvidia-smi` banner.
    pub async fn probe_driver(&self) -> Result<Option<DriverReport>, ProcessError> {
        let spec = CommandSpec::new("nvidia-smi").timeout(PROBE_TIMEOUT);
        Ok(self
            .probe(spec)
            .await?
            .map(|result| parse_nvidia_smi(&result.output)))
    }

    /// Signal (c): greatest versioned install root on disk.
    pub fn probe_toolkit_filesystem(&self) -> Option<ToolkitInfo> {
        let location = self.locator.newest_versioned_install()?;
        Some(ToolkitInfo {
            version: location.version?,
            root: Some(location.root),
            source: ToolkitSource::Filesystem,
        })
    }

    /// Combine the signals: toolkit compiler > filesystem > driver-only.
    pub async fn detect_accelerator(&self) -> Result<AcceleratorInfo, ProcessError> {
        let driver = self.probe_driver().await?;
        let toolkit = match self.probe_toolkit_compiler().await? {
            Some(found) => Some(found),
            None => self.probe_toolkit_filesystem(),
        };

        let info = AcceleratorInfo {
            nvidia_hardware: driver.is_some(),
            driver_version: driver.as_ref().and_then(|d| d.driver_version.clone()),
            recommended_toolkit: driver.as_ref().and_then(|d| d.cuda_version),
            toolkit,
        };
        debug!(?info, "Accelerator detection finished");
        Ok(info)
    }

    // ========================================================================
    // Package managers and compiler
    // ========================================================================

    pub async fn detect_package_managers(
        &self,
        interpreter: Option<&Path>,
    ) -> Result<Vec<PackageManager>, ProcessError> {
        let mut managers = Vec::new();
        if let Some(python) = interpreter {
            let pip = CommandSpec::new(python)
                .args(["-m", "pip", "--version"])
                .timeout(PROBE_TIMEOUT)
                .label("pip --version");
            if self.probe(pip).await?.is_some() {
                managers.push(PackageManager::Pip);
            }
        }
        let uv = CommandSpec::new("uv").arg("--version").timeout(PROBE_TIMEOUT);
        if self.probe(uv).await?.is_some() {
            managers.push(PackageManager::Uv);
        }
        Ok(managers)
    }

    pub async fn detect_compiler(&self) -> Result<bool, ProcessError> {
        for compiler in COMPILERS {
            // `cl` prints its banner and exits non-zero without inputs.
            let spec = if cfg!(windows) {
                CommandSpec::new(*compiler).timeout(PROBE_TIMEOUT)
            } else {
                CommandSpec::new(*compiler)
                    .arg("--version")
                    .timeout(PROBE_TIMEOUT)
            };
            match self.runner.run(&spec, &self.cancel).await {
                Ok(result) if result.success() || (cfg!(windows) && !result.timed_out) => {
                    debug!(compiler, "C++ compiler found");
                    return Ok(true);
                }
                Err(e) if e.is_cancelled() => return Err(e),
                _ => {}
            }
        }
        Ok(false)
    }

    // ========================================================================
    // Snapshot
    // ========================================================================

    /// Compose every signal into one immutable snapshot.
    ///
    /// A selected venv's interpreter becomes the session interpreter.
    pub async fn snapshot(&self) -> Result<EnvironmentSnapshot, ProcessError> {
        let venv = self.detect_virtual_env();

        let venv_interpreter = match &venv {
            Some(env) => self
                .check_interpreter(&env.interpreter)
                .await?
                .filter(InterpreterInfo::is_supported),
            None => None,
        };
        let interpreter = match venv_interpreter {
            Some(info) => Some(info),
            None => self.detect_interpreter().await?,
        };

        let accelerator = self.detect_accelerator().await?;
        let package_managers = self
            .detect_package_managers(interpreter.as_ref().map(|i| i.path.as_path()))
            .await?;
        let compiler_present = self.detect_compiler().await?;

        let virtual_env = venv
            .filter(|env| interpreter.as_ref().is_some_and(|i| i.path == env.interpreter))
            .map(|env| env.root);

        info!(
            interpreter = ?interpreter.as_ref().map(|i| &i.path),
            venv = ?virtual_env,
            nvidia = accelerator.nvidia_hardware,
            toolkit = ?accelerator.toolkit.as_ref().map(|t| t.version.to_string()),
            ?package_managers,
            compiler_present,
            "Environment probed"
        );

        Ok(EnvironmentSnapshot {
            interpreter_version: interpreter.as_ref().and_then(|i| i.version.clone()),
            interpreter: interpreter.map(|i| i.path),
            virtual_env,
            accelerator,
            compiler_present,
            package_managers,
        })
    }
}

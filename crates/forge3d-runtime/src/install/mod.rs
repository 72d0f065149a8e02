//! Dependency installation through pip or uv.
//!
//! Every entry point takes the session's installer guard, so a group
//! install and a single-package install never run side by side. Status
//! updates are posted to the UI thread and are bound to the interpreter the
//! installer was built for.

mod markers;
mod mode;
mod torch;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use forge3d_core::{
    CommandRunner, CommandSpec, DependencyGroup, DependencyStatus, EnvironmentSnapshot,
    INSTALL_TIMEOUT, PROBE_TIMEOUT, PackageManager, PackageSpec, ProcessError, ProcessResult,
    ResolvedMode,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::session::OrchestrationSession;

pub use markers::{InstallVerdict, classify_install, show_lists_package};
pub use mode::resolve_mode;
pub use torch::{TorchRuntime, parse_torch_runtime};

/// Packages served from the mode-specific accelerator index.
const ACCELERATOR_PACKAGES: &[&str] = &["torch", "torchvision"];

/// Import checks are quick but may load heavy native modules.
const IMPORT_CHECK_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("No interpreter detected; nothing to install into")]
    NoInterpreter,

    #[error(transparent)]
    Process(#[from] ProcessError),
}

impl InstallError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Process(e) if e.is_cancelled())
    }
}

/// Interpreter and package manager every command of the installer uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallTarget {
    pub interpreter: PathBuf,
    pub manager: PackageManager,
}

impl InstallTarget {
    pub fn new(interpreter: impl Into<PathBuf>, manager: PackageManager) -> Self {
        Self {
            interpreter: interpreter.into(),
            manager,
        }
    }

    /// Pick the target from a probe snapshot. Falls back to pip when no
    /// manager was detected, so the failure surfaces as a real transcript.
    pub fn from_snapshot(snapshot: &EnvironmentSnapshot, prefer_uv: bool) -> Result<Self, InstallError> {
        let interpreter = snapshot
            .interpreter
            .clone()
            .ok_or(InstallError::NoInterpreter)?;
        let manager = snapshot.package_manager(prefer_uv).unwrap_or_else(|| {
            warn!(interpreter = %interpreter.display(), "No package manager detected, trying pip");
            PackageManager::Pip
        });
        Ok(Self::new(interpreter, manager))
    }

    fn install_command(&self, requirement: &[&str], index_url: Option<&str>) -> CommandSpec {
        let python = self.interpreter.to_string_lossy().into_owned();
        let base = match self.manager {
            PackageManager::Pip => CommandSpec::new(&self.interpreter)
                .args(["-m", "pip", "install"])
                .label("pip install"),
            PackageManager::Uv => CommandSpec::new("uv")
                .args(["pip", "install", "--python", python.as_str()])
                .label("uv pip install"),
        };
        let mut spec = base.args(requirement.iter().copied()).timeout(INSTALL_TIMEOUT);
        if let Some(url) = index_url {
            spec = spec.args(["--index-url", url]);
        }
        spec
    }

    fn show_command(&self, name: &str) -> CommandSpec {
        let python = self.interpreter.to_string_lossy().into_owned();
        match self.manager {
            PackageManager::Pip => CommandSpec::new(&self.interpreter)
                .args(["-m", "pip", "show", name])
                .label("pip show"),
            PackageManager::Uv => CommandSpec::new("uv")
                .args(["pip", "show", "--python", python.as_str(), name])
                .label("uv pip show"),
        }
        .timeout(PROBE_TIMEOUT * 10)
    }

    fn import_command(&self, module: &str) -> CommandSpec {
        let script = format!("import {module}; print(getattr({module}, '__version__', 'unknown'))");
        CommandSpec::new(&self.interpreter)
            .args(["-c", script.as_str()])
            .timeout(IMPORT_CHECK_TIMEOUT)
            .label(format!("import {module}"))
    }
}

/// How one package install ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageOutcome {
    Installed,
    Failed,
    TimedOut,
    /// No marker; status untouched.
    Ambiguous,
}

impl PackageOutcome {
    pub const fn is_error(self) -> bool {
        matches!(self, Self::Failed | Self::TimedOut)
    }
}

/// Per-package results of one group install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupOutcome {
    pub group: String,
    pub required: bool,
    pub packages: Vec<(String, PackageOutcome)>,
}

impl GroupOutcome {
    pub fn has_errors(&self) -> bool {
        self.packages.iter().any(|(_, o)| o.is_error())
    }

    pub fn failed(&self) -> impl Iterator<Item = &str> {
        self.packages
            .iter()
            .filter(|(_, o)| o.is_error())
            .map(|(name, _)| name.as_str())
    }

    pub fn installed_count(&self) -> usize {
        self.packages
            .iter()
            .filter(|(_, o)| *o == PackageOutcome::Installed)
            .count()
    }
}

/// Installs and checks packages for one interpreter.
pub struct DependencyInstaller {
    runner: Arc<dyn CommandRunner>,
    session: Arc<OrchestrationSession>,
    target: InstallTarget,
}

impl DependencyInstaller {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        session: Arc<OrchestrationSession>,
        target: InstallTarget,
    ) -> Self {
        let interpreter = target.interpreter.clone();
        session.post(move |s| {
            s.statuses.bind_environment(&interpreter);
        });
        Self {
            runner,
            session,
            target,
        }
    }

    pub const fn target(&self) -> &InstallTarget {
        &self.target
    }

    fn post_status(&self, package: &str, status: DependencyStatus) {
        let interpreter = self.target.interpreter.clone();
        let package = package.to_string();
        self.session.post(move |s| {
            if s.statuses.environment() == Some(interpreter.as_path()) {
                s.statuses.apply(&package, status);
            } else {
                debug!(%package, %status, "Status update for a stale environment dropped");
            }
        });
    }

    async fn run(&self, spec: &CommandSpec) -> Result<ProcessResult, ProcessError> {
        self.runner.run(spec, self.session.cancel_token()).await
    }

    // ========================================================================
    // Installs
    // ========================================================================

    /// Install every package of `group` in order.
    ///
    /// `on_progress(done, len)` is called after each package.
    pub async fn install_group(
        &self,
        group: &DependencyGroup,
        mode: ResolvedMode,
        on_progress: &mut (dyn FnMut(usize, usize) + Send),
    ) -> Result<GroupOutcome, InstallError> {
        let _guard = self.session.lock_installer().await?;
        info!(
            group = %group.name,
            packages = group.len(),
            manager = %self.target.manager,
            %mode,
            "Installing dependency group"
        );
        self.session
            .log_info(format!("Installing {} ({} packages)", group.name, group.len()));

        let mut packages = Vec::with_capacity(group.len());
        for (i, package) in group.packages().iter().enumerate() {
            let outcome = self.install_locked(package, mode).await?;
            packages.push((package.key(), outcome));
            on_progress(i + 1, group.len());
        }

        let outcome = GroupOutcome {
            group: group.name.clone(),
            required: group.required,
            packages,
        };
        if outcome.has_errors() {
            let failed: Vec<&str> = outcome.failed().collect();
            warn!(group = %group.name, ?failed, "Dependency group finished with errors");
            self.session.log_warning(format!(
                "{} finished with errors: {}",
                group.name,
                failed.join(", ")
            ));
        } else {
            self.session.log_info(format!("{} installed", group.name));
        }
        Ok(outcome)
    }

    /// Install one package outside any group. Only that package's status changes.
    pub async fn install_single(
        &self,
        package: &PackageSpec,
        mode: ResolvedMode,
    ) -> Result<PackageOutcome, InstallError> {
        let _guard = self.session.lock_installer().await?;
        self.install_locked(package, mode).await
    }

    /// `pip install -e <repo>` for the generator package itself.
    pub async fn install_editable(
        &self,
        repo: &Path,
        status_key: &str,
    ) -> Result<PackageOutcome, InstallError> {
        let _guard = self.session.lock_installer().await?;
        let repo_arg = repo.to_string_lossy().into_owned();
        let spec = self
            .target
            .install_command(&["-e", repo_arg.as_str()], None)
            .cwd(repo);
        self.session
            .log_info(format!("Installing {status_key} from {}", repo.display()));
        let result = self.run(&spec).await?;
        let outcome = match (result.timed_out, classify_install(self.target.manager, &result.output)) {
            (true, _) => PackageOutcome::TimedOut,
            (false, verdict) if verdict.claims_installed() && result.success() => {
                PackageOutcome::Installed
            }
            (false, InstallVerdict::Ambiguous) => PackageOutcome::Ambiguous,
            _ => PackageOutcome::Failed,
        };
        self.record(status_key, outcome, &result);
        Ok(outcome)
    }

    async fn install_locked(
        &self,
        package: &PackageSpec,
        mode: ResolvedMode,
    ) -> Result<PackageOutcome, InstallError> {
        let key = package.key();
        let index_url = ACCELERATOR_PACKAGES
            .contains(&key.as_str())
            .then(|| mode.index_url());

        let spec = self
            .target
            .install_command(&[package.spec.as_str()], index_url)
            .label(format!("install {key}"));
        debug!(package = %key, index_url = ?index_url, "Installing package");
        let result = self.run(&spec).await?;

        let outcome = if result.timed_out {
            PackageOutcome::TimedOut
        } else {
            match classify_install(self.target.manager, &result.output) {
                verdict if verdict.claims_installed() => {
                    if self.show_check(&key).await? {
                        PackageOutcome::Installed
                    } else {
                        warn!(package = %key, ?verdict, "Install reported success but show-check failed");
                        PackageOutcome::Failed
                    }
                }
                InstallVerdict::Failed => PackageOutcome::Failed,
                _ => PackageOutcome::Ambiguous,
            }
        };
        self.record(&key, outcome, &result);
        Ok(outcome)
    }

    fn record(&self, key: &str, outcome: PackageOutcome, result: &ProcessResult) {
        match outcome {
            PackageOutcome::Installed => {
                debug!(package = %key, elapsed_ms = result.duration.as_millis(), "Package installed");
                self.post_status(key, DependencyStatus::Installed);
                self.session.log_info(format!("{key}: installed"));
            }
            PackageOutcome::Failed => {
                warn!(package = %key, exit_code = result.exit_code, "Package install failed");
                self.post_status(key, DependencyStatus::Error);
                self.session
                    .log_error(format!("{key}: install failed: {}", result.tail(3).trim()));
            }
            PackageOutcome::TimedOut => {
                warn!(package = %key, "Package install timed out");
                self.post_status(key, DependencyStatus::Error);
                self.session.log_error(format!(
                    "{key}: install did not finish within {} minutes",
                    INSTALL_TIMEOUT.as_secs() / 60
                ));
            }
            PackageOutcome::Ambiguous => {
                info!(package = %key, exit_code = result.exit_code, "No install marker in transcript");
                self.session
                    .log_warning(format!("{key}: install result unclear, status unchanged"));
            }
        }
    }

    /// Confirm with the package manager that the interpreter sees `name`.
    async fn show_check(&self, name: &str) -> Result<bool, ProcessError> {
        let result = self.run(&self.target.show_command(name)).await?;
        Ok(result.success() && show_lists_package(&result.output))
    }

    // ========================================================================
    // Checks
    // ========================================================================

    /// Import-check one package. Re-checks an installed package explicitly.
    pub async fn check_package(&self, package: &PackageSpec) -> Result<DependencyStatus, InstallError> {
        let _guard = self.session.lock_installer().await?;
        self.check_locked(package).await
    }

    /// Import-check every package of `group`.
    pub async fn check_group(
        &self,
        group: &DependencyGroup,
    ) -> Result<Vec<(String, DependencyStatus)>, InstallError> {
        let _guard = self.session.lock_installer().await?;
        let mut statuses = Vec::with_capacity(group.len());
        for package in group.packages() {
            statuses.push((package.key(), self.check_locked(package).await?));
        }
        Ok(statuses)
    }

    /// Ask the installed torch whether it can use CUDA. `None` when torch
    /// does not import or prints nothing recognizable.
    pub async fn check_torch_runtime(&self) -> Result<Option<TorchRuntime>, InstallError> {
        let _guard = self.session.lock_installer().await?;
        let spec = CommandSpec::new(&self.target.interpreter)
            .args(["-c", torch::TORCH_RUNTIME_SCRIPT])
            .timeout(IMPORT_CHECK_TIMEOUT)
            .label("torch cuda check");
        let result = self.run(&spec).await?;
        if !result.success() {
            debug!(exit_code = result.exit_code, "torch runtime check failed");
            return Ok(None);
        }
        let runtime = parse_torch_runtime(&result.output);
        debug!(?runtime, "torch runtime check");
        Ok(runtime)
    }

    async fn check_locked(&self, package: &PackageSpec) -> Result<DependencyStatus, InstallError> {
        let key = package.key();
        {
            let interpreter = self.target.interpreter.clone();
            let key = key.clone();
            self.session.post(move |s| {
                if s.statuses.environment() == Some(interpreter.as_path()) {
                    s.statuses.request_recheck(&key);
                    s.statuses.apply(&key, DependencyStatus::Checking);
                }
            });
        }

        let result = self.run(&self.target.import_command(&package.import_name)).await?;
        let status = if result.timed_out {
            DependencyStatus::Error
        } else if result.success() {
            DependencyStatus::Installed
        } else {
            DependencyStatus::NotInstalled
        };
        debug!(package = %key, module = %package.import_name, %status, "Import check");
        self.post_status(&key, status);
        Ok(status)
    }
}

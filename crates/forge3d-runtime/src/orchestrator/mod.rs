//! End-to-end installation session.
//!
//! ```text
//! reset -> probe -> resolve mode -> accelerator group -> remaining groups
//!       -> repository + target package -> native extensions -> verify
//! ```
//!
//! The aggregate status is `Done` only when the final import check passes.
//! Under [`FailurePolicy::FailFast`] an error in a required group stops the
//! session; optional groups and native extensions never do.

mod repo;
mod verify;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use forge3d_core::{
    AggregateStatus, CommandRunner, DependencyGroup, EnvironmentSnapshot, ExtensionOutcome,
    FailurePolicy, FixedPolicy, InstallationMode, ModePrompt, NativeExtension,
    NonInteractiveModePrompt, ProcessError, ProgressTracker, RecoveryPolicy, ResolvedMode,
    SessionState, Settings,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::install::{DependencyInstaller, GroupOutcome, InstallError, InstallTarget};
use crate::probe::{EnvironmentProbe, ProbeConfig};
use crate::process::{ToolkitLocator, build_pythonpath};
use crate::recovery::CompilationRecoveryEngine;
use crate::session::OrchestrationSession;

pub use repo::{RepoState, TARGET_PACKAGE, ensure_repository, repository_present};
pub use verify::{VERIFY_MARKER, VERIFY_MODULE, verification_command, verification_passed};

#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("No interpreter found; install Python or set `interpreter` with `forge3d config set`")]
    NoInterpreter,

    #[error("Required dependency group '{group}' failed: {}", .packages.join(", "))]
    RequiredGroupFailed { group: String, packages: Vec<String> },

    #[error("Generator repository unavailable: {0}")]
    RepositoryUnavailable(String),

    #[error("Final verification failed: {0}")]
    VerificationFailed(String),

    #[error("Cancelled")]
    Cancelled,

    #[error(transparent)]
    Process(ProcessError),
}

impl OrchestrationError {
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<ProcessError> for OrchestrationError {
    fn from(e: ProcessError) -> Self {
        if e.is_cancelled() {
            Self::Cancelled
        } else {
            Self::Process(e)
        }
    }
}

impl From<InstallError> for OrchestrationError {
    fn from(e: InstallError) -> Self {
        match e {
            InstallError::NoInterpreter => Self::NoInterpreter,
            InstallError::Process(e) => e.into(),
        }
    }
}

/// Everything the orchestrator needs to know up front.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub requested_mode: InstallationMode,
    pub prefer_uv: bool,
    pub failure_policy: FailurePolicy,
    pub probe: ProbeConfig,
    pub repo_dir: PathBuf,
    pub repo_url: String,
    pub scripts_dir: Option<PathBuf>,
    /// Groups installed after the accelerator group, in order.
    pub groups: Vec<DependencyGroup>,
}

impl OrchestratorConfig {
    pub fn from_settings(settings: &Settings, project_root: &Path) -> Self {
        let repo_dir = settings.effective_repo_dir(project_root);
        Self {
            requested_mode: settings.installation_mode,
            prefer_uv: settings.prefer_uv,
            failure_policy: settings.failure_policy,
            probe: ProbeConfig {
                configured_interpreter: settings.interpreter.clone(),
                project_root: project_root.to_path_buf(),
                repo_dir: Some(repo_dir.clone()),
            },
            repo_dir,
            repo_url: settings.effective_repo_url().to_string(),
            scripts_dir: Some(settings.effective_scripts_dir(project_root)),
            groups: DependencyGroup::default_sequence(),
        }
    }
}

/// What a finished session did.
#[derive(Debug, Clone)]
pub struct OrchestrationReport {
    pub snapshot: EnvironmentSnapshot,
    pub mode: ResolvedMode,
    pub groups: Vec<GroupOutcome>,
    pub extensions: Vec<(NativeExtension, ExtensionOutcome)>,
    pub verified: bool,
}

/// Runs one installation session against an [`OrchestrationSession`].
pub struct InstallationOrchestrator {
    runner: Arc<dyn CommandRunner>,
    session: Arc<OrchestrationSession>,
    config: OrchestratorConfig,
    mode_prompt: Arc<dyn ModePrompt>,
    recovery_policy: Arc<dyn RecoveryPolicy>,
    locator: Option<ToolkitLocator>,
}

impl InstallationOrchestrator {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        session: Arc<OrchestrationSession>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            runner,
            session,
            config,
            mode_prompt: Arc::new(NonInteractiveModePrompt),
            recovery_policy: Arc::new(FixedPolicy::conservative()),
            locator: None,
        }
    }

    #[must_use]
    pub fn with_mode_prompt(mut self, prompt: Arc<dyn ModePrompt>) -> Self {
        self.mode_prompt = prompt;
        self
    }

    #[must_use]
    pub fn with_recovery_policy(mut self, policy: Arc<dyn RecoveryPolicy>) -> Self {
        self.recovery_policy = policy;
        self
    }

    /// Toolkit locator for the probe. Defaults to the system locations.
    #[must_use]
    pub fn with_locator(mut self, locator: ToolkitLocator) -> Self {
        self.locator = Some(locator);
        self
    }

    pub const fn session(&self) -> &Arc<OrchestrationSession> {
        &self.session
    }

    /// Run the whole session and publish the aggregate status.
    pub async fn run(&self) -> Result<OrchestrationReport, OrchestrationError> {
        self.session.post(SessionState::reset);
        self.session
            .log_info(format!("Installation session {} started", self.session.id()));

        let result = self.run_steps().await;

        let aggregate = match &result {
            Ok(_) => AggregateStatus::Done,
            Err(e) if e.is_cancelled() => AggregateStatus::Cancelled,
            Err(e) => AggregateStatus::Failed(e.to_string()),
        };
        match &aggregate {
            AggregateStatus::Done => {
                info!(session = %self.session.id(), "Installation finished");
                self.session.log_info("Installation finished");
            }
            AggregateStatus::Cancelled => {
                info!(session = %self.session.id(), "Installation cancelled");
                self.session.log_warning("Installation cancelled");
            }
            other => {
                warn!(session = %self.session.id(), status = %other, "Installation failed");
                self.session.log_error(other.to_string());
            }
        }
        self.session.post(move |s| {
            if aggregate == AggregateStatus::Done {
                s.set_progress(1.0);
            }
            s.current_step = None;
            s.aggregate = aggregate;
        });
        result
    }

    fn step(&self, label: impl Into<String>) -> Result<(), OrchestrationError> {
        if self.session.is_cancelled() {
            return Err(OrchestrationError::Cancelled);
        }
        let label = label.into();
        info!(session = %self.session.id(), step = %label, "Step started");
        self.session.log_info(label.clone());
        self.session.post(move |s| s.current_step = Some(label));
        Ok(())
    }

    fn report_progress(&self, fraction: f64) {
        self.session.post(move |s| s.set_progress(fraction));
    }

    fn check_required(&self, outcome: &GroupOutcome) -> Result<(), OrchestrationError> {
        if !outcome.required || !outcome.has_errors() {
            return Ok(());
        }
        let packages: Vec<String> = outcome.failed().map(str::to_string).collect();
        match self.config.failure_policy {
            FailurePolicy::FailFast => Err(OrchestrationError::RequiredGroupFailed {
                group: outcome.group.clone(),
                packages,
            }),
            FailurePolicy::BestEffort => {
                warn!(group = %outcome.group, ?packages, "Required group failed, continuing (best effort)");
                self.session.log_warning(format!(
                    "{} failed, continuing; final verification decides",
                    outcome.group
                ));
                Ok(())
            }
        }
    }

    async fn run_steps(&self) -> Result<OrchestrationReport, OrchestrationError> {
        let groups: Vec<DependencyGroup> = std::iter::once(DependencyGroup::accelerator())
            .chain(self.config.groups.iter().cloned())
            .collect();
        // groups, then repository + target, extensions, verification
        let mut tracker = ProgressTracker::new(groups.len() + 3);
        let mut step_no = 0;

        // Probe
        self.step("Probing environment")?;
        let mut probe = EnvironmentProbe::new(self.runner.clone(), self.config.probe.clone())
            .with_cancel(self.session.cancel_token().clone());
        if let Some(locator) = &self.locator {
            probe = probe.with_locator(locator.clone());
        }
        let snapshot = probe.snapshot().await?;
        {
            let snapshot = snapshot.clone();
            self.session.post(move |s| s.snapshot = Some(snapshot));
        }

        let mode = self
            .session
            .resolve_mode(
                self.config.requested_mode,
                &snapshot,
                self.mode_prompt.as_ref(),
            )
            .await;
        self.session.log_info(format!("Installation mode: {mode}"));

        let target = InstallTarget::from_snapshot(&snapshot, self.config.prefer_uv)?;
        let interpreter = target.interpreter.clone();
        self.session.log_info(format!(
            "Using {} via {}",
            interpreter.display(),
            target.manager
        ));
        let installer =
            DependencyInstaller::new(self.runner.clone(), self.session.clone(), target);

        let mut report = OrchestrationReport {
            snapshot: snapshot.clone(),
            mode,
            groups: Vec::with_capacity(groups.len()),
            extensions: Vec::with_capacity(NativeExtension::ALL.len()),
            verified: false,
        };

        // Dependency groups
        for group in &groups {
            self.step(format!("Installing {}", group.name))?;
            let outcome = {
                let session = self.session.clone();
                let tracker_ref = &mut tracker;
                let mut on_progress = move |done: usize, len: usize| {
                    let fraction = tracker_ref.update(step_no, done, len);
                    session.post(move |s| s.set_progress(fraction));
                };
                installer.install_group(group, mode, &mut on_progress).await?
            };
            step_no += 1;
            self.report_progress(tracker.update(step_no, 0, 1));
            self.check_required(&outcome)?;
            report.groups.push(outcome);
        }

        // Repository and target package
        self.step("Installing generator package")?;
        ensure_repository(
            self.runner.as_ref(),
            &self.session,
            &self.config.repo_dir,
            &self.config.repo_url,
        )
        .await?;
        let target_outcome = installer
            .install_editable(&self.config.repo_dir, TARGET_PACKAGE)
            .await?;
        self.check_required(&GroupOutcome {
            group: TARGET_PACKAGE.to_string(),
            required: true,
            packages: vec![(TARGET_PACKAGE.to_string(), target_outcome)],
        })?;
        step_no += 1;
        self.report_progress(tracker.update(step_no, 0, 1));

        // Native extensions
        self.step("Building native extensions")?;
        let engine = CompilationRecoveryEngine::new(
            self.runner.clone(),
            self.session.clone(),
            &interpreter,
            &self.config.repo_dir,
        );
        for (i, extension) in NativeExtension::ALL.into_iter().enumerate() {
            if self.session.is_cancelled() {
                return Err(OrchestrationError::Cancelled);
            }
            let outcome = if !mode.is_accelerated() {
                ExtensionOutcome::NotApplicable {
                    reason: "CPU mode".to_string(),
                }
            } else if !snapshot.compiler_present {
                ExtensionOutcome::NotApplicable {
                    reason: "no C++ compiler".to_string(),
                }
            } else {
                engine
                    .build_with_recovery(extension, self.recovery_policy.as_ref())
                    .await?
            };
            info!(extension = %extension, outcome = %outcome, "Native extension finished");
            {
                let outcome = outcome.clone();
                self.session
                    .post(move |s| s.record_extension(extension, outcome));
            }
            report.extensions.push((extension, outcome));
            self.report_progress(tracker.update(step_no, i + 1, NativeExtension::ALL.len()));
        }
        step_no += 1;

        // Verification
        self.step("Verifying installation")?;
        let existing = std::env::var_os("PYTHONPATH");
        let pythonpath = build_pythonpath(
            self.config.scripts_dir.as_deref(),
            Some(self.config.repo_dir.as_path()),
            Some(self.config.probe.project_root.as_path()),
            existing.as_deref(),
        );
        let spec = verification_command(&interpreter, &self.config.repo_dir, pythonpath.as_deref());
        let result = self
            .runner
            .run(&spec, self.session.cancel_token())
            .await?;
        if !verification_passed(&result) {
            let reason = if result.timed_out {
                "import check did not finish".to_string()
            } else {
                result.tail(3).trim().to_string()
            };
            return Err(OrchestrationError::VerificationFailed(reason));
        }
        self.session
            .log_info(format!("{VERIFY_MODULE} imports cleanly"));
        report.verified = true;
        self.report_progress(tracker.update(step_no + 1, 0, 1));

        Ok(report)
    }
}

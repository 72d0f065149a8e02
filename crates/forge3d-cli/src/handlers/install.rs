//! `forge3d install`: run a full orchestration session.

use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::{Result, bail};
use forge3d_core::{
    FailurePolicy, FixedPolicy, ModePrompt, NonInteractiveModePrompt, ProgressReporter,
    RecoveryPolicy, SessionState,
};
use forge3d_runtime::{
    Dispatcher, InstallationOrchestrator, OrchestrationSession, OrchestratorConfig,
};
use tracing::info;

use super::{cancel_on_interrupt, session_id};
use crate::bootstrap::CliContext;
use crate::commands::{InstallArgs, RecoveryChoice};
use crate::presentation::print_install_report;
use crate::progress::CliProgress;
use crate::prompts::{TerminalModePrompt, TerminalRecoveryPolicy};
use crate::render::{SessionView, drive};

/// Apply command-line overrides on top of the settings.
fn configure(ctx: &CliContext, args: &InstallArgs) -> OrchestratorConfig {
    let mut config = ctx.orchestrator_config();
    if let Some(mode) = args.mode {
        config.requested_mode = mode;
    }
    if args.best_effort {
        config.failure_policy = FailurePolicy::BestEffort;
    }
    if args.uv {
        config.prefer_uv = true;
    }
    config
}

fn recovery_policy(choice: RecoveryChoice, progress: &Arc<CliProgress>) -> Arc<dyn RecoveryPolicy> {
    match choice {
        RecoveryChoice::Skip => Arc::new(FixedPolicy::conservative()),
        RecoveryChoice::Auto => Arc::new(FixedPolicy::aggressive()),
        RecoveryChoice::Interactive => Arc::new(TerminalRecoveryPolicy::new(progress.clone())),
    }
}

pub async fn execute(ctx: &CliContext, args: InstallArgs, verbose: bool) -> Result<()> {
    let config = configure(ctx, &args);
    info!(
        mode = %config.requested_mode,
        policy = ?config.failure_policy,
        recovery = ?args.recovery,
        repo = %config.repo_dir.display(),
        "Starting install"
    );

    let progress = Arc::new(CliProgress::new());
    let mode_prompt: Arc<dyn ModePrompt> = if std::io::stdin().is_terminal() {
        Arc::new(TerminalModePrompt::new(progress.clone()))
    } else {
        Arc::new(NonInteractiveModePrompt)
    };

    let mut dispatcher = Dispatcher::new();
    let session = Arc::new(OrchestrationSession::new(session_id(), dispatcher.handle()));
    cancel_on_interrupt(session.cancel_token().clone());

    let orchestrator = InstallationOrchestrator::new(ctx.runner.clone(), session, config)
        .with_mode_prompt(mode_prompt)
        .with_recovery_policy(recovery_policy(args.recovery, &progress));

    let mut state = SessionState::new();
    let mut view = SessionView::new(verbose);
    let result = drive(
        orchestrator.run(),
        &mut dispatcher,
        &mut state,
        &mut view,
        progress.as_ref(),
    )
    .await;

    match &result {
        Ok(_) => progress.finish("Installation complete"),
        Err(e) => progress.finish_with_error(&e.to_string()),
    }
    print_install_report(result.as_ref().ok(), &state);

    match result {
        Ok(_) => Ok(()),
        Err(e) if e.is_cancelled() => bail!("Installation cancelled"),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge3d_core::{InstallationMode, Settings};
    use forge3d_runtime::TokioCommandRunner;
    use std::path::PathBuf;

    fn context() -> CliContext {
        CliContext {
            settings: Settings::default(),
            settings_path: PathBuf::from("/tmp/forge3d/settings.json"),
            project_root: PathBuf::from("/work"),
            runner: Arc::new(TokioCommandRunner::with_toolkit(None)),
        }
    }

    #[test]
    fn test_flags_override_settings() {
        let args = InstallArgs {
            mode: Some(InstallationMode::Cpu),
            recovery: RecoveryChoice::Skip,
            best_effort: true,
            uv: false,
        };
        let config = configure(&context(), &args);
        assert_eq!(config.requested_mode, InstallationMode::Cpu);
        assert_eq!(config.failure_policy, FailurePolicy::BestEffort);
        assert_eq!(config.repo_dir, PathBuf::from("/work/Hunyuan3D-2"));
    }

    #[test]
    fn test_defaults_come_from_settings() {
        let args = InstallArgs {
            mode: None,
            recovery: RecoveryChoice::Skip,
            best_effort: false,
            uv: false,
        };
        let config = configure(&context(), &args);
        assert_eq!(config.requested_mode, InstallationMode::Auto);
        assert_eq!(config.failure_policy, FailurePolicy::FailFast);
    }
}

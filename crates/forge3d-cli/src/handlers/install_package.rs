//! `forge3d install-package`: one package, outside any group.

use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::{Result, bail};
use forge3d_core::{
    InstallationMode, ModePrompt, NonInteractiveModePrompt, PackageSpec, SessionState,
    bare_package_name,
};
use forge3d_runtime::{
    DependencyInstaller, Dispatcher, InstallTarget, OrchestrationSession, PackageOutcome,
};

use super::{cancel_on_interrupt, probe, session_id};
use crate::bootstrap::CliContext;
use crate::presentation::{GREEN, RED, RESET, YELLOW};
use crate::progress::CliProgress;
use crate::prompts::TerminalModePrompt;
use crate::render::{SessionView, drive};

/// Package spec from a requirement and an optional import name.
fn package_spec(requirement: &str, import_name: Option<String>) -> PackageSpec {
    match import_name {
        Some(module) => PackageSpec::new(requirement, module),
        None => PackageSpec::simple(requirement),
    }
}

pub async fn execute(
    ctx: &CliContext,
    requirement: &str,
    import_name: Option<String>,
    mode: Option<InstallationMode>,
) -> Result<()> {
    if bare_package_name(requirement).is_empty() {
        bail!("'{requirement}' is not a package requirement");
    }
    let package = package_spec(requirement, import_name);

    let progress = Arc::new(CliProgress::hidden());
    let mut dispatcher = Dispatcher::new();
    let session = Arc::new(OrchestrationSession::new(session_id(), dispatcher.handle()));
    cancel_on_interrupt(session.cancel_token().clone());

    let snapshot = probe(ctx, session.cancel_token()).await?;
    let prompt: Arc<dyn ModePrompt> = if std::io::stdin().is_terminal() {
        Arc::new(TerminalModePrompt::new(progress.clone()))
    } else {
        Arc::new(NonInteractiveModePrompt)
    };
    let requested = mode.unwrap_or(ctx.settings.installation_mode);
    let resolved = session
        .resolve_mode(requested, &snapshot, prompt.as_ref())
        .await;

    let target = InstallTarget::from_snapshot(&snapshot, ctx.settings.prefer_uv)?;
    println!(
        "Installing {} into {} ({}, {resolved})",
        package.spec,
        target.interpreter.display(),
        target.manager
    );
    let installer = DependencyInstaller::new(ctx.runner.clone(), session, target);

    let mut state = SessionState::new();
    let mut view = SessionView::new(true);
    let outcome = drive(
        installer.install_single(&package, resolved),
        &mut dispatcher,
        &mut state,
        &mut view,
        progress.as_ref(),
    )
    .await?;

    let key = package.key();
    match outcome {
        PackageOutcome::Installed => {
            println!("{GREEN}✓ {key} installed{RESET}");
            Ok(())
        }
        PackageOutcome::Ambiguous => {
            println!("{YELLOW}? {key}: the installer output was not conclusive{RESET}");
            println!("Run `forge3d diagnose` to import-check it.");
            Ok(())
        }
        PackageOutcome::Failed | PackageOutcome::TimedOut => {
            println!("{RED}✗ {key}: {}{RESET}", state.statuses.get(&key));
            bail!("Installing {key} failed")
        }
    }
}

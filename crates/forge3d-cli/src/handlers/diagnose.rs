//! `forge3d diagnose`: snapshot plus import checks, nothing installed.

use std::sync::Arc;

use anyhow::{Result, bail};
use forge3d_core::{DependencyGroup, SessionState};
use forge3d_runtime::{
    DependencyInstaller, Dispatcher, InstallTarget, OrchestrationSession, diagnose,
};

use super::{cancel_on_interrupt, probe, session_id};
use crate::bootstrap::CliContext;
use crate::presentation::{print_diagnostic_report, print_snapshot};
use crate::progress::CliProgress;
use crate::render::{SessionView, drive};

/// Every group `install` would touch, accelerator first.
fn groups_to_check() -> Vec<DependencyGroup> {
    std::iter::once(DependencyGroup::accelerator())
        .chain(DependencyGroup::default_sequence())
        .collect()
}

pub async fn execute(ctx: &CliContext, json: bool) -> Result<()> {
    let mut dispatcher = Dispatcher::new();
    let session = Arc::new(OrchestrationSession::new(session_id(), dispatcher.handle()));
    cancel_on_interrupt(session.cancel_token().clone());

    let snapshot = probe(ctx, session.cancel_token()).await?;
    let installer = InstallTarget::from_snapshot(&snapshot, ctx.settings.prefer_uv)
        .ok()
        .map(|target| DependencyInstaller::new(ctx.runner.clone(), session.clone(), target));

    let groups = groups_to_check();
    let progress = CliProgress::hidden();
    let mut state = SessionState::new();
    let mut view = SessionView::new(false);
    let report = drive(
        diagnose(snapshot, installer.as_ref(), &groups),
        &mut dispatcher,
        &mut state,
        &mut view,
        &progress,
    )
    .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_snapshot(&report.snapshot);
        println!();
        print_diagnostic_report(&report);
    }

    if !report.is_healthy() {
        bail!("Environment is not ready for generation");
    }
    Ok(())
}

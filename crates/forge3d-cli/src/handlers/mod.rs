//! Command handlers.
//!
//! Each handler is a thin wrapper: build what it needs from the
//! [`CliContext`](crate::bootstrap::CliContext), call the runtime, format
//! the result for the terminal.

pub mod check;
pub mod config;
pub mod diagnose;
pub mod generate;
pub mod install;
pub mod install_package;

use anyhow::{Context, Result};
use forge3d_core::EnvironmentSnapshot;
use forge3d_runtime::EnvironmentProbe;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::bootstrap::CliContext;

/// Cancel `token` on the first Ctrl-C.
pub(crate) fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupted, cancelling");
                token.cancel();
            }
            Err(e) => debug!(error = %e, "Cannot listen for Ctrl-C"),
        }
    });
}

/// Probe the machine with the context's settings.
pub(crate) async fn probe(
    ctx: &CliContext,
    cancel: &CancellationToken,
) -> Result<EnvironmentSnapshot> {
    EnvironmentProbe::new(ctx.runner.clone(), ctx.probe_config())
        .with_cancel(cancel.clone())
        .snapshot()
        .await
        .context("Environment probe failed")
}

/// Short session id for log correlation.
pub(crate) fn session_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

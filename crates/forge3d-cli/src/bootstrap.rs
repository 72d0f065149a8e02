//! CLI bootstrap - the composition root.
//!
//! The only place where settings, paths and the process runner are wired
//! together. Handlers receive the composed [`CliContext`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use forge3d_core::paths::{default_project_root, settings_path};
use forge3d_core::{CommandRunner, Settings};
use forge3d_runtime::{OrchestratorConfig, ProbeConfig, TokioCommandRunner};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::parser::Cli;

/// Install the tracing subscriber. `RUST_LOG` wins over `--verbose`.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Fully composed context for CLI commands.
pub struct CliContext {
    pub settings: Settings,
    pub settings_path: PathBuf,
    pub project_root: PathBuf,
    pub runner: Arc<dyn CommandRunner>,
}

impl CliContext {
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig::from_settings(&self.settings, &self.project_root)
    }

    pub fn probe_config(&self) -> ProbeConfig {
        self.orchestrator_config().probe
    }

    pub fn repo_dir(&self) -> PathBuf {
        self.settings.effective_repo_dir(&self.project_root)
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.settings.effective_scripts_dir(&self.project_root)
    }
}

/// Load settings, apply command-line overrides and build the runner.
pub fn bootstrap(cli: &Cli) -> Result<CliContext> {
    let settings_path = settings_path().context("Cannot resolve the settings location")?;
    let mut settings = Settings::load(&settings_path)
        .with_context(|| format!("Cannot load {}", settings_path.display()))?;
    if let Some(interpreter) = &cli.interpreter {
        settings.interpreter = Some(interpreter.clone());
    }

    let project_root = resolve_project_root(cli.project_root.as_deref(), &settings)?;
    debug!(
        settings = %settings_path.display(),
        project_root = %project_root.display(),
        "Bootstrapped"
    );

    Ok(CliContext {
        settings,
        settings_path,
        project_root,
        runner: Arc::new(TokioCommandRunner::new()),
    })
}

fn resolve_project_root(flag: Option<&Path>, settings: &Settings) -> Result<PathBuf> {
    if let Some(root) = flag {
        return Ok(root.to_path_buf());
    }
    let cwd = default_project_root()?;
    Ok(settings.effective_project_root(&cwd))
}

//! Native extension builds and the recovery branches after a failed build.
//!
//! The decision itself is pure ([`forge3d_core::decide`]); this module runs
//! the builds, rewrites the build script for the patch branch and turns every
//! path through the state machine into an [`ExtensionOutcome`]. No outcome is
//! fatal to the session. Only cancellation and spawn failures propagate.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use forge3d_core::recovery::{BUILD_DESCRIPTOR, PatchedSource, patch_build_script};
use forge3d_core::{
    BUILD_TIMEOUT, CommandRunner, CommandSpec, ExtensionOutcome, FailureKind, NativeExtension,
    ProcessError, ProcessResult, RecoveryDecision, RecoveryPolicy, classify, decide, guidance,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::session::OrchestrationSession;

/// setuptools prints this after a completed `setup.py install`.
const BUILD_FINISHED_MARKER: &str = "Finished processing dependencies for";
const BUILD_INSTALLED_MARKER: &str = "Successfully installed";

/// Suffix of the untouched copy kept next to a patched build script.
pub const BACKUP_SUFFIX: &str = "orig";

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to back up {path}: {source}")]
    Backup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What [`apply_patch`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchResult {
    Written,
    AlreadyPatched,
}

fn backup_path(descriptor: &Path) -> PathBuf {
    let mut name = descriptor.as_os_str().to_owned();
    name.push(".");
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Rewrite a build script in place. The first patch keeps a `.orig` copy;
/// a script that already carries the marker is left untouched.
pub async fn apply_patch(descriptor: &Path) -> Result<PatchResult, PatchError> {
    let source = tokio::fs::read_to_string(descriptor)
        .await
        .map_err(|source| PatchError::Read {
            path: descriptor.to_path_buf(),
            source,
        })?;

    let patched = match patch_build_script(&source) {
        PatchedSource::AlreadyPatched => {
            debug!(path = %descriptor.display(), "Build script already patched");
            return Ok(PatchResult::AlreadyPatched);
        }
        PatchedSource::Patched(text) => text,
    };

    let backup = backup_path(descriptor);
    if !backup.exists() {
        tokio::fs::write(&backup, &source)
            .await
            .map_err(|source| PatchError::Backup {
                path: backup.clone(),
                source,
            })?;
    }
    tokio::fs::write(descriptor, patched)
        .await
        .map_err(|source| PatchError::Write {
            path: descriptor.to_path_buf(),
            source,
        })?;
    info!(path = %descriptor.display(), backup = %backup.display(), "Patched build script");
    Ok(PatchResult::Written)
}

/// A build counts only with a clean exit and setuptools' completion line.
pub fn build_succeeded(result: &ProcessResult) -> bool {
    result.success()
        && (result.contains(BUILD_FINISHED_MARKER) || result.contains(BUILD_INSTALLED_MARKER))
}

/// Builds the optional native extensions of the generator repository.
pub struct CompilationRecoveryEngine {
    runner: Arc<dyn CommandRunner>,
    session: Arc<OrchestrationSession>,
    interpreter: PathBuf,
    repo_root: PathBuf,
}

impl CompilationRecoveryEngine {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        session: Arc<OrchestrationSession>,
        interpreter: impl Into<PathBuf>,
        repo_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            session,
            interpreter: interpreter.into(),
            repo_root: repo_root.into(),
        }
    }

    pub fn extension_dir(&self, extension: NativeExtension) -> PathBuf {
        self.repo_root.join(extension.relative_dir())
    }

    fn build_command(&self, extension: NativeExtension) -> CommandSpec {
        CommandSpec::new(&self.interpreter)
            .args([BUILD_DESCRIPTOR, "install"])
            .cwd(self.extension_dir(extension))
            .timeout(BUILD_TIMEOUT)
            .label(format!("build {}", extension.name()))
            .toolkit_env()
    }

    async fn build(&self, spec: &CommandSpec) -> Result<ProcessResult, ProcessError> {
        let result = self.runner.run(spec, self.session.cancel_token()).await?;
        if result.timed_out {
            self.session.log_error(format!(
                "{}: did not finish within {} minutes",
                spec.label,
                BUILD_TIMEOUT.as_secs() / 60
            ));
        }
        Ok(result)
    }

    /// Build one extension, running the recovery state machine on failure.
    pub async fn build_with_recovery(
        &self,
        extension: NativeExtension,
        policy: &dyn RecoveryPolicy,
    ) -> Result<ExtensionOutcome, ProcessError> {
        let dir = self.extension_dir(extension);
        if !dir.join(BUILD_DESCRIPTOR).is_file() {
            warn!(extension = %extension, dir = %dir.display(), "Extension source not found");
            self.session
                .log_warning(format!("{extension}: source not found, skipping build"));
            return Ok(ExtensionOutcome::NotApplicable {
                reason: "source not found".to_string(),
            });
        }

        self.session.log_info(format!("Building {extension}"));
        let spec = self.build_command(extension);
        let first = self.build(&spec).await?;
        if build_succeeded(&first) {
            info!(extension = %extension, elapsed_ms = first.duration.as_millis(), "Extension built");
            self.session.log_info(format!("{extension}: built"));
            return Ok(ExtensionOutcome::Built);
        }

        let kind = classify(&first.output);
        warn!(extension = %extension, %kind, exit_code = first.exit_code, "Extension build failed");
        self.session
            .log_warning(format!("{extension}: build failed ({kind})"));

        self.session.flush_ui().await;
        let outcome = match decide(kind, policy) {
            RecoveryDecision::Retry { flag } => self.forced_rebuild(extension, spec, &flag).await?,
            RecoveryDecision::Patch { descriptor } => {
                self.patched_rebuild(extension, spec, &dir.join(descriptor))
                    .await?
            }
            RecoveryDecision::ShowGuidance => {
                self.show_guidance(extension, kind);
                ExtensionOutcome::Unresolved
            }
            RecoveryDecision::Skip => {
                info!(extension = %extension, "Skipping extension");
                self.session.log_warning(format!(
                    "{extension}: skipped, texture generation will be unavailable"
                ));
                ExtensionOutcome::Skipped
            }
        };
        Ok(outcome)
    }

    async fn forced_rebuild(
        &self,
        extension: NativeExtension,
        spec: CommandSpec,
        flag: &str,
    ) -> Result<ExtensionOutcome, ProcessError> {
        warn!(extension = %extension, flag, "Forcing build with an unsupported host compiler");
        self.session.log_warning(format!(
            "{extension}: rebuilding with {flag}; the extension may build but only partially work"
        ));
        let result = self.build(&spec.env("NVCC_APPEND_FLAGS", flag)).await?;
        Ok(self.rebuild_outcome(extension, &result, "forced unsupported compiler"))
    }

    async fn patched_rebuild(
        &self,
        extension: NativeExtension,
        spec: CommandSpec,
        descriptor: &Path,
    ) -> Result<ExtensionOutcome, ProcessError> {
        match apply_patch(descriptor).await {
            Ok(PatchResult::Written) => self
                .session
                .log_info(format!("{extension}: patched {}", descriptor.display())),
            Ok(PatchResult::AlreadyPatched) => self
                .session
                .log_info(format!("{extension}: build script already patched")),
            Err(e) => {
                warn!(extension = %extension, error = %e, "Patch failed");
                self.session.log_error(format!("{extension}: {e}"));
                return Ok(ExtensionOutcome::Failed);
            }
        }
        let result = self.build(&spec).await?;
        Ok(self.rebuild_outcome(extension, &result, "patched build script"))
    }

    fn rebuild_outcome(
        &self,
        extension: NativeExtension,
        result: &ProcessResult,
        note: &str,
    ) -> ExtensionOutcome {
        if build_succeeded(result) {
            info!(extension = %extension, note, "Extension built after recovery");
            self.session
                .log_info(format!("{extension}: built after recovery ({note})"));
            ExtensionOutcome::Recovered {
                note: note.to_string(),
            }
        } else {
            warn!(extension = %extension, note, exit_code = result.exit_code, "Recovery rebuild failed");
            self.session.log_error(format!(
                "{extension}: rebuild failed: {}",
                result.tail(3).trim()
            ));
            ExtensionOutcome::Failed
        }
    }

    fn show_guidance(&self, extension: NativeExtension, kind: FailureKind) {
        self.session
            .log_warning(format!("{extension}: manual steps required"));
        for line in guidance(kind).lines() {
            self.session.log_info(line.to_string());
        }
    }
}

//! Terminal adapters for the mode prompt and the recovery policy.
//!
//! Both pause the progress bar while waiting for an answer. A closed stdin
//! or a read error counts as no answer: CPU for the mode, skip for recovery.

use std::sync::Arc;

use forge3d_core::{
    AcceleratorInfo, FailureKind, InstallationMode, ModePrompt, RecoveryAction, RecoveryPolicy,
    ResolvedMode,
};
use tracing::warn;

use crate::progress::CliProgress;
use crate::utils::input::prompt_choice;

const MODE_CHOICES: &[InstallationMode] = &[
    InstallationMode::Cuda12,
    InstallationMode::Cuda11,
    InstallationMode::Cpu,
];

/// Asks which accelerator build to install.
pub struct TerminalModePrompt {
    progress: Arc<CliProgress>,
}

impl TerminalModePrompt {
    pub const fn new(progress: Arc<CliProgress>) -> Self {
        Self { progress }
    }
}

impl ModePrompt for TerminalModePrompt {
    fn choose_mode(&self, accelerator: &AcceleratorInfo) -> Option<ResolvedMode> {
        self.progress.suspend(|| {
            println!();
            println!(
                "NVIDIA hardware found (driver {}), but no CUDA version could be determined.",
                accelerator.driver_version.as_deref().unwrap_or("unknown")
            );
            match prompt_choice("Installation mode", MODE_CHOICES, InstallationMode::Cpu) {
                Ok(answer) => answer.and_then(InstallationMode::concrete),
                Err(e) => {
                    warn!(error = %e, "Mode prompt failed, using CPU");
                    None
                }
            }
        })
    }
}

/// Asks how to handle each failed native-extension build.
pub struct TerminalRecoveryPolicy {
    progress: Arc<CliProgress>,
}

impl TerminalRecoveryPolicy {
    pub const fn new(progress: Arc<CliProgress>) -> Self {
        Self { progress }
    }
}

impl RecoveryPolicy for TerminalRecoveryPolicy {
    fn choose(&self, kind: FailureKind, offered: &[RecoveryAction]) -> RecoveryAction {
        self.progress.suspend(|| {
            println!();
            println!("Native extension build failed: {kind}");
            for action in offered {
                println!("  {:<6} {}", action.to_string(), describe(*action));
            }
            match prompt_choice("Action", offered, RecoveryAction::Skip) {
                Ok(Some(action)) => action,
                Ok(None) => RecoveryAction::Skip,
                Err(e) => {
                    warn!(error = %e, "Recovery prompt failed, skipping");
                    RecoveryAction::Skip
                }
            }
        })
    }
}

const fn describe(action: RecoveryAction) -> &'static str {
    match action {
        RecoveryAction::Force => {
            "rebuild allowing the unsupported compiler (may only partially work)"
        }
        RecoveryAction::Patch => "rewrite setup.py so warnings are not errors, then rebuild",
        RecoveryAction::Guide => "show manual steps and leave the extension unbuilt",
        RecoveryAction::Skip => "continue without this extension",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge3d_core::offered_actions;

    #[test]
    fn test_every_offered_action_is_described() {
        for kind in [
            FailureKind::ToolchainVersion,
            FailureKind::BuildToolAbort,
            FailureKind::Unrecognized,
        ] {
            for action in offered_actions(kind) {
                assert!(!describe(*action).is_empty());
            }
        }
    }
}

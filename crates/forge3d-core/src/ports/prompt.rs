//! Operator prompt used when the accelerator mode cannot be decided alone.

use crate::domain::{AcceleratorInfo, ResolvedMode};

/// Asks the operator to pick an accelerator mode.
///
/// Only consulted when NVIDIA hardware is present but neither the toolkit
/// nor the driver reports a usable version.
#[cfg_attr(test, mockall::automock)]
pub trait ModePrompt: Send + Sync {
    /// `None` means no answer; the caller falls back to CPU.
    fn choose_mode(&self, accelerator: &AcceleratorInfo) -> Option<ResolvedMode>;
}

/// Never answers. Used by batch runs and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NonInteractiveModePrompt;

impl ModePrompt for NonInteractiveModePrompt {
    fn choose_mode(&self, _accelerator: &AcceleratorInfo) -> Option<ResolvedMode> {
        None
    }
}

/// Always answers with the same mode.
#[derive(Debug, Clone, Copy)]
pub struct FixedModePrompt(pub ResolvedMode);

impl ModePrompt for FixedModePrompt {
    fn choose_mode(&self, _accelerator: &AcceleratorInfo) -> Option<ResolvedMode> {
        Some(self.0)
    }
}

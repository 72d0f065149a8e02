//! Resolution of `InstallationMode::Auto`.

use forge3d_core::{EnvironmentSnapshot, InstallationMode, ModePrompt, ResolvedMode};
use tracing::debug;

/// Turn the requested mode into a concrete one.
///
/// Explicit modes pass through. `Auto` checks, in order: no interpreter
/// (CPU, nothing to install into), the installed toolkit's major version,
/// the driver's recommended toolkit, then NVIDIA hardware without version
/// information (ask the prompt, CPU if it declines). Everything else is CPU.
pub fn resolve_mode(
    requested: InstallationMode,
    snapshot: &EnvironmentSnapshot,
    prompt: &dyn ModePrompt,
) -> ResolvedMode {
    if let Some(mode) = requested.concrete() {
        return mode;
    }
    if !snapshot.has_interpreter() {
        debug!("No interpreter, resolving auto mode to CPU");
        return ResolvedMode::Cpu;
    }

    let accelerator = &snapshot.accelerator;
    if let Some(toolkit) = &accelerator.toolkit {
        debug!(toolkit = %toolkit.version, "Auto mode from installed toolkit");
        return toolkit.version.mode();
    }
    if let Some(recommended) = accelerator.recommended_toolkit {
        debug!(%recommended, "Auto mode from driver recommendation");
        return recommended.mode();
    }
    if accelerator.nvidia_hardware {
        let chosen = prompt.choose_mode(accelerator).unwrap_or(ResolvedMode::Cpu);
        debug!(%chosen, "Auto mode from prompt");
        return chosen;
    }
    ResolvedMode::Cpu
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge3d_core::{
        AcceleratorInfo, CudaVersion, FixedModePrompt, NonInteractiveModePrompt, ToolkitInfo,
        ToolkitSource,
    };
    use std::path::PathBuf;

    /// Fails the test if consulted.
    struct NeverAsked;

    impl ModePrompt for NeverAsked {
        fn choose_mode(&self, _accelerator: &AcceleratorInfo) -> Option<ResolvedMode> {
            panic!("prompt must not be consulted");
        }
    }

    fn with_interpreter(accelerator: AcceleratorInfo) -> EnvironmentSnapshot {
        EnvironmentSnapshot {
            interpreter: Some(PathBuf::from("/usr/bin/python3")),
            accelerator,
            ..EnvironmentSnapshot::default()
        }
    }

    #[test]
    fn test_explicit_mode_passes_through() {
        let snapshot = EnvironmentSnapshot::default();
        assert_eq!(
            resolve_mode(InstallationMode::Cuda11, &snapshot, &NeverAsked),
            ResolvedMode::Cuda11
        );
    }

    #[test]
    fn test_no_interpreter_is_cpu_without_prompt() {
        let snapshot = EnvironmentSnapshot {
            accelerator: AcceleratorInfo {
                nvidia_hardware: true,
                ..AcceleratorInfo::default()
            },
            ..EnvironmentSnapshot::default()
        };
        assert_eq!(
            resolve_mode(InstallationMode::Auto, &snapshot, &NeverAsked),
            ResolvedMode::Cpu
        );
    }

    #[test]
    fn test_toolkit_beats_driver() {
        let snapshot = with_interpreter(AcceleratorInfo {
            nvidia_hardware: true,
            driver_version: Some("535.104".into()),
            toolkit: Some(ToolkitInfo {
                version: CudaVersion::new(11, 8),
                root: None,
                source: ToolkitSource::Compiler,
            }),
            recommended_toolkit: Some(CudaVersion::new(12, 2)),
        });
        assert_eq!(
            resolve_mode(InstallationMode::Auto, &snapshot, &NeverAsked),
            ResolvedMode::Cuda11
        );
    }

    #[test]
    fn test_driver_recommendation_used() {
        let snapshot = with_interpreter(AcceleratorInfo {
            nvidia_hardware: true,
            recommended_toolkit: Some(CudaVersion::new(12, 4)),
            ..AcceleratorInfo::default()
        });
        assert_eq!(
            resolve_mode(InstallationMode::Auto, &snapshot, &NeverAsked),
            ResolvedMode::Cuda12
        );
    }

    #[test]
    fn test_hardware_without_version_asks_prompt() {
        let snapshot = with_interpreter(AcceleratorInfo {
            nvidia_hardware: true,
            ..AcceleratorInfo::default()
        });
        assert_eq!(
            resolve_mode(
                InstallationMode::Auto,
                &snapshot,
                &FixedModePrompt(ResolvedMode::Cuda11)
            ),
            ResolvedMode::Cuda11
        );
        assert_eq!(
            resolve_mode(InstallationMode::Auto, &snapshot, &NonInteractiveModePrompt),
            ResolvedMode::Cpu
        );
    }

    #[test]
    fn test_no_accelerator_is_cpu() {
        let snapshot = with_interpreter(AcceleratorInfo::default());
        assert_eq!(
            resolve_mode(InstallationMode::Auto, &snapshot, &NeverAsked),
            ResolvedMode::Cpu
        );
    }
}

//! OS-facing runtime for forge3d.
//!
//! Implements the core ports against real processes and the filesystem:
//! command execution with timeouts and group kill, environment probing,
//! package installation, native-extension builds with recovery, and the
//! orchestration session that ties them together. State shown to the
//! operator is only ever mutated through the [`Dispatcher`].

pub mod diagnose;
pub mod dispatcher;
pub mod generation;
pub mod install;
pub mod orchestrator;
pub mod probe;
pub mod process;
pub mod recovery;
pub mod session;

pub use diagnose::{DiagnosticReport, GroupReport, PackageReport, diagnose};
pub use dispatcher::{Dispatcher, DispatcherHandle};
pub use generation::{GenerationError, GenerationLauncher, GenerationPaths};
pub use install::{
    DependencyInstaller, GroupOutcome, InstallError, InstallTarget, PackageOutcome, TorchRuntime,
    resolve_mode,
};
pub use orchestrator::{
    InstallationOrchestrator, OrchestrationError, OrchestrationReport, OrchestratorConfig,
};
pub use probe::{EnvironmentProbe, InterpreterInfo, ProbeConfig};
pub use process::{TokioCommandRunner, ToolkitLocation, ToolkitLocator, build_pythonpath};
pub use recovery::{CompilationRecoveryEngine, PatchError, PatchResult, apply_patch};
pub use session::OrchestrationSession;

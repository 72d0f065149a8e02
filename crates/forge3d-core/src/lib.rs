//! Core domain types and port definitions for forge3d.
//!
//! This crate is pure: it defines what the environment engine works with
//! (dependency groups, statuses, snapshots, process results, recovery
//! decisions, the persisted settings record) and the traits the runtime
//! implements. Nothing in here spawns a process.

pub mod domain;
pub mod paths;
pub mod ports;
pub mod recovery;
pub mod settings;

// Re-export commonly used types for convenience
pub use domain::{
    AcceleratorInfo, AggregateStatus, BUILD_TIMEOUT, CLONE_TIMEOUT, CommandSpec, CudaVersion,
    DependencyGroup, DependencyStatus, EnvironmentSnapshot, ExtensionOutcome, GenerationOutcome,
    GenerationParams, GenerationRequest, INSTALL_TIMEOUT, InputKind, InstallationMode, LogBuffer,
    LogEntry, LogLevel, MeshFormat, PROBE_TIMEOUT, PackageManager, PackageSpec, ProcessResult,
    ProgressTracker, ResolvedMode, SessionState, StatusChange, StatusMap, ToolkitInfo,
    ToolkitSource, bare_package_name,
};
pub use paths::{PathError, config_root, settings_path};
pub use ports::{
    CommandRunner, FixedModePrompt, LineSink, ModePrompt, NonInteractiveModePrompt, NoopProgress,
    NoopSink, ProcessError, ProgressReporter,
};
pub use recovery::{
    FailureKind, FixedPolicy, NativeExtension, RecoveryAction, RecoveryDecision, RecoveryPolicy,
    classify, decide, guidance, offered_actions,
};
pub use settings::{FailurePolicy, Settings, SettingsError};

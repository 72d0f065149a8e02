//! Domain types for the environment engine.
//!
//! These types describe environments, dependencies and process results
//! without knowing how they are probed or executed.

mod dependency;
mod environment;
mod generation;
mod log;
mod mode;
mod process;
mod progress;
mod session_state;
mod status;

pub use dependency::{DependencyGroup, PackageSpec, bare_package_name};
pub use environment::{
    AcceleratorInfo, CudaVersion, EnvironmentSnapshot, PackageManager, ToolkitInfo, ToolkitSource,
};
pub use generation::{
    BATCH_SUCCESS_MARKER, GenerationOutcome, GenerationParams, GenerationRequest,
    IMAGE_EXTENSIONS, InputKind, MeshFormat, SINGLE_SUCCESS_MARKER,
};
pub use log::{LogBuffer, LogEntry, LogLevel, MAX_LOG_ENTRIES};
pub use mode::{
    InstallationMode, ResolvedMode, TORCH_INDEX_CPU, TORCH_INDEX_CUDA11, TORCH_INDEX_CUDA12,
};
pub use process::{
    BUILD_TIMEOUT, CLONE_TIMEOUT, CommandSpec, INSTALL_TIMEOUT, PROBE_TIMEOUT, ProcessResult,
};
pub use progress::ProgressTracker;
pub use session_state::{AggregateStatus, ExtensionOutcome, SessionState};
pub use status::{DependencyStatus, StatusChange, StatusMap};

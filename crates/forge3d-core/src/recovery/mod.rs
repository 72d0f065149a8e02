//! Native-extension build failure classification and recovery decisions.
//!
//! Everything here is pure. The runtime engine feeds in a failed build
//! transcript, asks [`decide`] what to do through an injected
//! [`RecoveryPolicy`], then performs the chosen action itself.
//!
//! ```text
//! classify --toolchain-version--> Force | Guide | Skip
//! classify --build-tool-abort---> Patch | Guide | Skip
//! classify --unrecognized-------> Guide | Skip
//! ```

mod patch;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use patch::{PATCH_MARKER_BEGIN, PATCH_MARKER_END, PatchedSource, patch_build_script};

/// Flag that lets the toolkit compiler accept an unsupported host compiler.
pub const ALLOW_UNSUPPORTED_COMPILER_FLAG: &str = "-allow-unsupported-compiler";

/// Build descriptor rewritten by the patch branch, relative to the extension dir.
pub const BUILD_DESCRIPTOR: &str = "setup.py";

const TOOLCHAIN_VERSION_SIGNATURES: &[&str] = &[
    "unsupported Microsoft Visual Studio version",
    "unsupported GNU version",
    ALLOW_UNSUPPORTED_COMPILER_FLAG,
];

const BUILD_TOOL_ABORT_SIGNATURES: &[&str] = &[
    "ninja: build stopped",
    "error C2220",
    "failed with exit code",
    "Error compiling objects for extension",
];

// ============================================================================
// Native extensions
// ============================================================================

/// Optional compiled extensions shipped with the generator repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NativeExtension {
    CustomRasterizer,
    DifferentiableRenderer,
}

impl NativeExtension {
    pub const ALL: [Self; 2] = [Self::CustomRasterizer, Self::DifferentiableRenderer];

    pub const fn name(self) -> &'static str {
        match self {
            Self::CustomRasterizer => "custom_rasterizer",
            Self::DifferentiableRenderer => "differentiable_renderer",
        }
    }

    /// Source directory relative to the repository root.
    pub const fn relative_dir(self) -> &'static str {
        match self {
            Self::CustomRasterizer => "hy3dgen/texgen/custom_rasterizer",
            Self::DifferentiableRenderer => "hy3dgen/texgen/differentiable_renderer",
        }
    }
}

impl fmt::Display for NativeExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Classification
// ============================================================================

/// Failure class derived from a build transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// Host compiler too new or too old for the toolkit.
    ToolchainVersion,
    /// The build tool aborted (warnings treated as errors, ninja stop).
    BuildToolAbort,
    Unrecognized,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ToolchainVersion => "toolchain version mismatch",
            Self::BuildToolAbort => "build tool abort",
            Self::Unrecognized => "unrecognized build failure",
        })
    }
}

/// Classify a failed build transcript. Toolchain signatures win over abort signatures.
pub fn classify(transcript: &str) -> FailureKind {
    if TOOLCHAIN_VERSION_SIGNATURES
        .iter()
        .any(|s| transcript.contains(s))
    {
        FailureKind::ToolchainVersion
    } else if BUILD_TOOL_ABORT_SIGNATURES
        .iter()
        .any(|s| transcript.contains(s))
    {
        FailureKind::BuildToolAbort
    } else {
        FailureKind::Unrecognized
    }
}

// ============================================================================
// Actions and decisions
// ============================================================================

/// A remediation branch an operator can pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryAction {
    Force,
    Patch,
    Guide,
    Skip,
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Force => "force",
            Self::Patch => "patch",
            Self::Guide => "guide",
            Self::Skip => "skip",
        })
    }
}

impl FromStr for RecoveryAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "f" | "force" => Ok(Self::Force),
            "p" | "patch" => Ok(Self::Patch),
            "g" | "guide" => Ok(Self::Guide),
            "s" | "skip" => Ok(Self::Skip),
            other => Err(format!("unknown recovery action '{other}'")),
        }
    }
}

/// Branches offered for a failure class, in display order.
pub const fn offered_actions(kind: FailureKind) -> &'static [RecoveryAction] {
    match kind {
        FailureKind::ToolchainVersion => &[
            RecoveryAction::Force,
            RecoveryAction::Guide,
            RecoveryAction::Skip,
        ],
        FailureKind::BuildToolAbort => &[
            RecoveryAction::Patch,
            RecoveryAction::Guide,
            RecoveryAction::Skip,
        ],
        FailureKind::Unrecognized => &[RecoveryAction::Guide, RecoveryAction::Skip],
    }
}

/// What the engine does next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryDecision {
    /// Rebuild with an extra compiler flag in the environment.
    Retry { flag: String },
    /// Rewrite the build descriptor, then rebuild.
    Patch { descriptor: String },
    ShowGuidance,
    Skip,
}

/// Chooses among the offered actions.
#[cfg_attr(test, mockall::automock)]
pub trait RecoveryPolicy: Send + Sync {
    fn choose(&self, kind: FailureKind, offered: &[RecoveryAction]) -> RecoveryAction;
}

/// Ask the policy, then map the answer to a decision.
///
/// An answer outside the offered set degrades to `Skip`.
pub fn decide(kind: FailureKind, policy: &dyn RecoveryPolicy) -> RecoveryDecision {
    let offered = offered_actions(kind);
    let action = policy.choose(kind, offered);
    if !offered.contains(&action) {
        tracing::warn!(%kind, %action, "Recovery action not offered for this failure, skipping");
        return RecoveryDecision::Skip;
    }
    match action {
        RecoveryAction::Force => RecoveryDecision::Retry {
            flag: ALLOW_UNSUPPORTED_COMPILER_FLAG.to_string(),
        },
        RecoveryAction::Patch => RecoveryDecision::Patch {
            descriptor: BUILD_DESCRIPTOR.to_string(),
        },
        RecoveryAction::Guide => RecoveryDecision::ShowGuidance,
        RecoveryAction::Skip => RecoveryDecision::Skip,
    }
}

/// Manual remediation steps for a failure class.
pub const fn guidance(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::ToolchainVersion => {
            "The host C++ compiler is not supported by the installed CUDA toolkit.\n\
             - Install a compiler version the toolkit supports (Visual Studio 2019/2022 \
             build tools on Windows, a GCC release listed in the CUDA release notes on Linux), or\n\
             - install a newer CUDA toolkit that supports your compiler, then\n\
             - re-run `forge3d install`."
        }
        FailureKind::BuildToolAbort => {
            "The extension build was aborted by the build tool, usually because \
             warnings are treated as errors.\n\
             - Check the log above for the first `error` line.\n\
             - Make sure the CUDA toolkit version matches the installed torch build.\n\
             - Retry with `forge3d install --recovery auto` to patch the build script."
        }
        FailureKind::Unrecognized => {
            "The extension build failed for an unrecognized reason.\n\
             - Verify a C++ compiler and the CUDA toolkit are on PATH (`forge3d check`).\n\
             - Build manually with `python setup.py install` inside the extension \
             directory to see the full error.\n\
             - Texture generation stays unavailable until the extension builds; \
             shape generation still works."
        }
    }
}

// ============================================================================
// Policies
// ============================================================================

/// Fixed answer per failure class. Used by batch runs and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPolicy {
    pub toolchain_version: RecoveryAction,
    pub build_tool_abort: RecoveryAction,
    pub unrecognized: RecoveryAction,
}

impl FixedPolicy {
    /// Same answer for every class.
    pub const fn always(action: RecoveryAction) -> Self {
        Self {
            toolchain_version: action,
            build_tool_abort: action,
            unrecognized: action,
        }
    }

    /// Skip everything. Default for non-interactive runs.
    pub const fn conservative() -> Self {
        Self::always(RecoveryAction::Skip)
    }

    /// Try the automated fix for each class, guidance otherwise.
    pub const fn aggressive() -> Self {
        Self {
            toolchain_version: RecoveryAction::Force,
            build_tool_abort: RecoveryAction::Patch,
            unrecognized: RecoveryAction::Guide,
        }
    }
}

impl Default for FixedPolicy {
    fn default() -> Self {
        Self::conservative()
    }
}

impl RecoveryPolicy for FixedPolicy {
    fn choose(&self, kind: FailureKind, _offered: &[RecoveryAction]) -> RecoveryAction {
        match kind {
            FailureKind::ToolchainVersion => self.toolchain_version,
            FailureKind::BuildToolAbort => self.build_tool_abort,
            FailureKind::Unrecognized => self.unrecognized,
        }
    }
}

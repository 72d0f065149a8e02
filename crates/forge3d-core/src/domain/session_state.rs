//! State owned by the UI thread and mutated only through dispatched callbacks.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::environment::EnvironmentSnapshot;
use super::log::LogBuffer;
use super::mode::ResolvedMode;
use super::status::StatusMap;
use crate::recovery::NativeExtension;

/// One aggregate status per orchestration session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AggregateStatus {
    #[default]
    Idle,
    Running,
    Done,
    Failed(String),
    Cancelled,
}

impl AggregateStatus {
    pub const fn is_finished(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_) | Self::Cancelled)
    }
}

impl fmt::Display for AggregateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Running => f.write_str("running"),
            Self::Done => f.write_str("done"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Terminal state of one optional native extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtensionOutcome {
    Built,
    /// Built after a forced or patched rebuild.
    Recovered { note: String },
    /// Operator chose to skip; the extension is unavailable.
    Skipped,
    /// Guidance was shown; the build stays broken.
    Unresolved,
    /// Recovery rebuild also failed.
    Failed,
    /// Not attempted in CPU mode or because the source is missing.
    NotApplicable { reason: String },
}

impl ExtensionOutcome {
    pub const fn is_available(&self) -> bool {
        matches!(self, Self::Built | Self::Recovered { .. })
    }
}

impl fmt::Display for ExtensionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Built => f.write_str("built"),
            Self::Recovered { note } => write!(f, "built after recovery ({note})"),
            Self::Skipped => f.write_str("skipped (unavailable)"),
            Self::Unresolved => f.write_str("unresolved (see guidance)"),
            Self::Failed => f.write_str("failed"),
            Self::NotApplicable { reason } => write!(f, "not built ({reason})"),
        }
    }
}

/// Everything the front-end renders for the current session.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub statuses: StatusMap,
    pub log: LogBuffer,
    pub progress: f64,
    pub aggregate: AggregateStatus,
    pub snapshot: Option<EnvironmentSnapshot>,
    pub resolved_mode: Option<ResolvedMode>,
    pub extensions: Vec<(NativeExtension, ExtensionOutcome)>,
    /// Human-readable label of the step in flight.
    pub current_step: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session start: wipe everything except the log, which is append-only.
    pub fn reset(&mut self) {
        self.statuses.clear();
        self.progress = 0.0;
        self.aggregate = AggregateStatus::Running;
        self.snapshot = None;
        self.resolved_mode = None;
        self.extensions.clear();
        self.current_step = None;
    }

    /// Monotonic progress update.
    pub fn set_progress(&mut self, fraction: f64) {
        if fraction > self.progress {
            self.progress = fraction.min(1.0);
        }
    }

    pub fn record_extension(&mut self, extension: NativeExtension, outcome: ExtensionOutcome) {
        if let Some(slot) = self.extensions.iter_mut().find(|(e, _)| *e == extension) {
            slot.1 = outcome;
        } else {
            self.extensions.push((extension, outcome));
        }
    }

    pub fn extension(&self, extension: NativeExtension) -> Option<&ExtensionOutcome> {
        self.extensions
            .iter()
            .find(|(e, _)| *e == extension)
            .map(|(_, o)| o)
    }
}

//! Port definitions (trait abstractions) for external systems.
//!
//! The runtime crate implements these against the real OS; tests substitute
//! fakes. Core code never spawns processes or reads stdin itself.

mod command_runner;
mod progress;
mod prompt;

use thiserror::Error;

pub use command_runner::{CommandRunner, LineSink, NoopSink};
pub use progress::{NoopProgress, ProgressReporter};
pub use prompt::{FixedModePrompt, ModePrompt, NonInteractiveModePrompt};

/// Errors a command run can surface.
///
/// Non-zero exits and timeouts are *results*, not errors: they come back as
/// a [`ProcessResult`](crate::ProcessResult).
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The program could not be started (not found, permission denied).
    #[error("Failed to start {program}: {reason}")]
    SpawnFailed { program: String, reason: String },

    /// The session was cancelled while the child was running.
    #[error("Cancelled while running {0}")]
    Cancelled(String),

    /// Waiting on or reading from the child failed.
    #[error("I/O error while running {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl ProcessError {
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

//! Port for executing external commands.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::ProcessError;
use crate::domain::{CommandSpec, ProcessResult};

/// Observer for transcript lines as they arrive.
///
/// Called from the reader task, so implementations must not block.
pub trait LineSink: Send + Sync {
    fn line(&self, label: &str, line: &str);
}

/// Sink that drops every line.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl LineSink for NoopSink {
    fn line(&self, _label: &str, _line: &str) {}
}

/// Runs one external command to completion.
///
/// # Contract
///
/// - stdout and stderr are merged into one transcript in arrival order
/// - a non-zero exit is `Ok` with that exit code
/// - on timeout the child is killed and reaped and `timed_out` is set
/// - on cancellation the child is killed and reaped and
///   [`ProcessError::Cancelled`] is returned
/// - only spawn failures and I/O errors produce other errors
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run with a live line observer.
    async fn run_with_sink(
        &self,
        spec: &CommandSpec,
        cancel: &CancellationToken,
        sink: &dyn LineSink,
    ) -> Result<ProcessResult, ProcessError>;

    async fn run(
        &self,
        spec: &CommandSpec,
        cancel: &CancellationToken,
    ) -> Result<ProcessResult, ProcessError> {
        self.run_with_sink(spec, cancel, &NoopSink).await
    }
}

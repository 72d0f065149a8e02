//! Progress reporting abstraction for long-running orchestration.
//!
//! Front-ends receive step labels and the aggregate fraction without the
//! engine knowing whether it is drawing a terminal bar or nothing at all.

/// Receives progress updates during an orchestration session.
pub trait ProgressReporter: Send + Sync {
    /// A named step started (e.g. "Installing core").
    fn step(&self, label: &str);

    /// Aggregate fraction in `0.0..=1.0`. Never decreases within a session.
    fn fraction(&self, value: f64);

    /// Informational line worth surfacing outside the log.
    fn message(&self, msg: &str);

    fn finish(&self, message: &str);

    fn finish_with_error(&self, message: &str);
}

/// A no-op progress reporter that ignores all updates.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn step(&self, _label: &str) {}
    fn fraction(&self, _value: f64) {}
    fn message(&self, _msg: &str) {}
    fn finish(&self, _message: &str) {}
    fn finish_with_error(&self, _message: &str) {}
}

//! Terminal progress bar for orchestration sessions.

use std::time::Duration;

use forge3d_core::ProgressReporter;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Resolution of the bar; the session fraction is scaled to this.
const SCALE: u64 = 1000;

/// `ProgressReporter` drawing a single indicatif bar on stderr.
pub struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::with_draw_target(Some(SCALE), ProgressDrawTarget::stderr());
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent:>3}% {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░"),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }

    /// Draws nothing. For `--json` output and tests.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Run `f` with the bar cleared, e.g. to read an answer from stdin.
    pub fn suspend<R>(&self, f: impl FnOnce() -> R) -> R {
        self.bar.suspend(f)
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

impl Default for CliProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for CliProgress {
    fn step(&self, label: &str) {
        self.bar.set_message(label.to_string());
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn fraction(&self, value: f64) {
        let position = (value.clamp(0.0, 1.0) * SCALE as f64).round() as u64;
        if position > self.bar.position() {
            self.bar.set_position(position);
        }
    }

    fn message(&self, msg: &str) {
        if self.bar.is_hidden() {
            eprintln!("{msg}");
        } else {
            self.bar.println(msg);
        }
    }

    fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    fn finish_with_error(&self, message: &str) {
        self.bar.abandon_with_message(message.to_string());
    }
}

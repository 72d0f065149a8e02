//! The CLI's UI loop: the only place session state is mutated.
//!
//! Background work posts callbacks; this loop applies them and mirrors the
//! result into a [`ProgressReporter`].

use std::future::Future;

use forge3d_core::{LogLevel, ProgressReporter, SessionState};
use forge3d_runtime::Dispatcher;

/// What has already been shown to the operator.
#[derive(Debug, Default)]
pub struct SessionView {
    log_mark: u64,
    last_step: Option<String>,
    show_info: bool,
}

impl SessionView {
    /// `show_info` also echoes info-level log lines, not only warnings and errors.
    pub fn new(show_info: bool) -> Self {
        Self {
            show_info,
            ..Self::default()
        }
    }

    pub fn render(&mut self, state: &SessionState, reporter: &dyn ProgressReporter) {
        if state.current_step != self.last_step {
            if let Some(step) = &state.current_step {
                reporter.step(step);
            }
            self.last_step.clone_from(&state.current_step);
        }
        reporter.fraction(state.progress);

        for entry in state.log.since(self.log_mark) {
            if self.show_info || entry.level != LogLevel::Info {
                reporter.message(&entry.to_string());
            }
        }
        self.log_mark = state.log.pushed();
    }
}

/// Run `work` while applying posted callbacks to `state`.
///
/// Returns once `work` completes and the queue has been drained.
pub async fn drive<F: Future>(
    work: F,
    dispatcher: &mut Dispatcher<SessionState>,
    state: &mut SessionState,
    view: &mut SessionView,
    reporter: &dyn ProgressReporter,
) -> F::Output {
    tokio::pin!(work);
    let output = loop {
        tokio::select! {
            output = &mut work => break output,
            _ = dispatcher.tick_wait(state) => view.render(state, reporter),
        }
    };
    dispatcher.tick(state);
    view.render(state, reporter);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        steps: Mutex<Vec<String>>,
        messages: Mutex<Vec<String>>,
        last_fraction: Mutex<f64>,
    }

    impl ProgressReporter for Recorder {
        fn step(&self, label: &str) {
            self.steps.lock().unwrap().push(label.to_string());
        }
        fn fraction(&self, value: f64) {
            *self.last_fraction.lock().unwrap() = value;
        }
        fn message(&self, msg: &str) {
            self.messages.lock().unwrap().push(msg.to_string());
        }
        fn finish(&self, _message: &str) {}
        fn finish_with_error(&self, _message: &str) {}
    }

    #[tokio::test]
    async fn test_drive_applies_background_posts() {
        let mut dispatcher = Dispatcher::new();
        let handle = dispatcher.handle();
        let mut state = SessionState::new();
        let mut view = SessionView::new(false);
        let recorder = Recorder::default();

        let work = async move {
            handle.post(|s: &mut SessionState| s.current_step = Some("Installing core".into()));
            tokio::task::yield_now().await;
            handle.post(|s: &mut SessionState| {
                s.log.info("quiet");
                s.log.warning("numpy: retrying");
                s.set_progress(0.5);
            });
            42
        };
        let out = drive(work, &mut dispatcher, &mut state, &mut view, &recorder).await;

        assert_eq!(out, 42);
        assert!((state.progress - 0.5).abs() < f64::EPSILON);
        assert_eq!(*recorder.steps.lock().unwrap(), vec!["Installing core"]);
        let messages = recorder.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("numpy: retrying"));
    }

    #[test]
    fn test_log_lines_shown_once() {
        let recorder = Recorder::default();
        let mut view = SessionView::new(true);
        let mut state = SessionState::new();
        state.log.info("first");
        view.render(&state, &recorder);
        state.log.info("second");
        view.render(&state, &recorder);
        view.render(&state, &recorder);
        assert_eq!(recorder.messages.lock().unwrap().len(), 2);
    }
}

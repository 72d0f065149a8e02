//! One orchestration session: cancellation, installer guard, cached mode.
//!
//! Everything that used to be process-wide lives here and is dropped with
//! the session. State the front-end renders is never touched directly; it
//! is mutated through the dispatcher handle.

use forge3d_core::{
    EnvironmentSnapshot, InstallationMode, ModePrompt, ProcessError, ResolvedMode, SessionState,
};
use tokio::sync::{Mutex, MutexGuard, OnceCell};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::dispatcher::DispatcherHandle;
use crate::install::resolve_mode;

/// Shared context for every task spawned on behalf of one session.
#[derive(Debug)]
pub struct OrchestrationSession {
    id: String,
    cancel: CancellationToken,
    ui: DispatcherHandle<SessionState>,
    install_guard: Mutex<()>,
    resolved_mode: OnceCell<ResolvedMode>,
}

impl OrchestrationSession {
    pub fn new(id: impl Into<String>, ui: DispatcherHandle<SessionState>) -> Self {
        Self {
            id: id.into(),
            cancel: CancellationToken::new(),
            ui,
            install_guard: Mutex::new(()),
            resolved_mode: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub const fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub const fn ui(&self) -> &DispatcherHandle<SessionState> {
        &self.ui
    }

    /// Queue a state mutation for the UI thread.
    pub fn post(&self, callback: impl FnOnce(&mut SessionState) + Send + 'static) {
        if !self.ui.post(callback) {
            debug!(session = %self.id, "UI dispatcher gone, dropping state update");
        }
    }

    pub fn log_info(&self, message: impl Into<String>) {
        let message = message.into();
        self.post(move |s| s.log.info(message));
    }

    pub fn log_warning(&self, message: impl Into<String>) {
        let message = message.into();
        self.post(move |s| s.log.warning(message));
    }

    pub fn log_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.post(move |s| s.log.error(message));
    }

    /// Give the UI loop one turn to apply queued posts. Call before handing
    /// control to a prompt that blocks this task.
    pub async fn flush_ui(&self) {
        tokio::task::yield_now().await;
    }

    /// Take the installer guard. Every package-manager invocation of the
    /// session runs under it, so installs never overlap.
    pub async fn lock_installer(&self) -> Result<MutexGuard<'_, ()>, ProcessError> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(ProcessError::Cancelled("installer guard".to_string())),
            guard = self.install_guard.lock() => Ok(guard),
        }
    }

    pub fn resolved_mode(&self) -> Option<ResolvedMode> {
        self.resolved_mode.get().copied()
    }

    /// Resolve the installation mode. Runs at most once per session;
    /// later calls return the cached answer.
    pub async fn resolve_mode(
        &self,
        requested: InstallationMode,
        snapshot: &EnvironmentSnapshot,
        prompt: &dyn ModePrompt,
    ) -> ResolvedMode {
        let mode = *self
            .resolved_mode
            .get_or_init(|| async {
                self.flush_ui().await;
                let mode = resolve_mode(requested, snapshot, prompt);
                info!(session = %self.id, %requested, resolved = %mode, "Installation mode resolved");
                mode
            })
            .await;
        self.post(move |s| s.resolved_mode = Some(mode));
        mode
    }
}

//! Marshals state mutations from background tasks onto the UI-owning thread.
//!
//! Background tasks hold a cloneable [`DispatcherHandle`] and `post` closures.
//! The single owner of the state calls [`Dispatcher::tick`] from its render
//! loop, which drains the queue in FIFO order. A panicking callback is caught
//! and logged; the rest of the queue still runs.

use std::panic::{AssertUnwindSafe, catch_unwind};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::error;

/// A queued state mutation.
pub type Callback<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

/// Sending side, handed to background tasks.
pub struct DispatcherHandle<S> {
    tx: UnboundedSender<Callback<S>>,
}

impl<S> Clone for DispatcherHandle<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<S> std::fmt::Debug for DispatcherHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatcherHandle")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl<S> DispatcherHandle<S> {
    /// Queue a callback. Returns `false` if the dispatcher is gone.
    pub fn post(&self, callback: impl FnOnce(&mut S) + Send + 'static) -> bool {
        self.tx.send(Box::new(callback)).is_ok()
    }
}

/// Receiving side, owned by the UI thread together with the state.
pub struct Dispatcher<S> {
    tx: UnboundedSender<Callback<S>>,
    rx: UnboundedReceiver<Callback<S>>,
}

impl<S> Default for Dispatcher<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Dispatcher<S> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    pub fn handle(&self) -> DispatcherHandle<S> {
        DispatcherHandle {
            tx: self.tx.clone(),
        }
    }

    /// Run every queued callback against `state`. Returns how many ran.
    pub fn tick(&mut self, state: &mut S) -> usize {
        let mut ran = 0;
        while let Ok(callback) = self.rx.try_recv() {
            Self::run_one(callback, state);
            ran += 1;
        }
        ran
    }

    /// Wait for at least one callback, then drain the queue.
    pub async fn tick_wait(&mut self, state: &mut S) -> usize {
        match self.rx.recv().await {
            Some(callback) => {
                Self::run_one(callback, state);
                1 + self.tick(state)
            }
            None => 0,
        }
    }

    fn run_one(callback: Callback<S>, state: &mut S) {
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(state))) {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(%reason, "Dispatched callback panicked");
        }
    }
}

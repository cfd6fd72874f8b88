//! Shutdown coordination for graceful process and listener teardown.
//!
//! A [`ShutdownState`] is a cloneable, one-way flag that components can poll
//! or await. The process keeps one root state that is raised when a
//! termination signal arrives; listeners and connections keep their own
//! states so they can be hung up independently of the process.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::debug;

/// Shared shutdown state for coordinating graceful shutdown across components.
#[derive(Debug, Clone)]
pub struct ShutdownState {
    /// Flag indicating shutdown has been initiated - no new work should be accepted
    shutdown_initiated: Arc<AtomicBool>,
    /// Flag indicating in-flight work has drained and final cleanup can begin
    shutdown_complete: Arc<AtomicBool>,
    /// Wakes every task parked in [`ShutdownState::wait`]
    notify: Arc<Notify>,
}

impl ShutdownState {
    /// Creates a new shutdown state with both flags set to false.
    pub fn new() -> Self {
        Self {
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
            shutdown_complete: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Returns true if shutdown has been initiated.
    pub fn is_shutdown_initiated(&self) -> bool {
        self.shutdown_initiated.load(Ordering::Acquire)
    }

    /// Returns true if shutdown is complete and final cleanup can begin.
    pub fn is_shutdown_complete(&self) -> bool {
        self.shutdown_complete.load(Ordering::Acquire)
    }

    /// Initiates shutdown and wakes every waiter. Calling it twice is harmless.
    pub fn initiate_shutdown(&self) {
        if !self.shutdown_initiated.swap(true, Ordering::AcqRel) {
            debug!("🛑 Shutdown initiated");
        }
        self.notify.notify_waiters();
    }

    /// Marks shutdown as complete - all in-flight work has been processed.
    pub fn complete_shutdown(&self) {
        self.shutdown_complete.store(true, Ordering::Release);
    }

    /// Resolves once [`ShutdownState::initiate_shutdown`] has been called.
    ///
    /// Returns immediately if shutdown was already initiated, so it is safe to
    /// use inside `tokio::select!` loops that re-create the future every turn.
    pub async fn wait(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Register interest before checking the flag so a concurrent
        // initiate_shutdown cannot slip between the check and the await.
        notified.as_mut().enable();
        if self.is_shutdown_initiated() {
            return;
        }
        notified.await;
    }
}

impl Default for ShutdownState {
    fn default() -> Self {
        Self::new()
    }
}

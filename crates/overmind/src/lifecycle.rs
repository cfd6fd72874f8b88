//! Ordered start and reverse-order stop of the process components.
//!
//! Hooks start in registration order. The first start failure aborts boot;
//! hooks already running are stopped again before the error is returned.
//! On shutdown the root [`ShutdownState`] is raised and hooks stop in
//! reverse order, sharing one grace deadline. A failing stop is logged and
//! the remaining hooks still stop.

use async_trait::async_trait;
use overmind_kit::ShutdownState;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info};

/// Error type returned by hooks.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// One component managed by the [`Lifecycle`].
#[async_trait]
pub trait LifecycleHook: Send + Sync {
    /// Component name used in logs.
    fn name(&self) -> &str;

    /// Starts the component. `root` is raised when the process shuts down.
    async fn on_start(&self, root: &ShutdownState) -> Result<(), HookError>;

    /// Stops the component within `grace`.
    async fn on_stop(&self, grace: Duration) -> Result<(), HookError>;
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("failed to start {name}: {reason}")]
    StartFailed { name: String, reason: String },

    #[error("lifecycle already started")]
    AlreadyStarted,
}

/// Startup and shutdown coordinator.
pub struct Lifecycle {
    hooks: Vec<Box<dyn LifecycleHook>>,
    root: ShutdownState,
    grace: Duration,
    started: usize,
}

impl Lifecycle {
    /// Creates an empty lifecycle whose stop phase lasts at most `grace`.
    pub fn new(grace: Duration) -> Self {
        Self {
            hooks: Vec::new(),
            root: ShutdownState::new(),
            grace,
            started: 0,
        }
    }

    /// Adds a hook. Hooks start in the order they are appended.
    pub fn append(&mut self, hook: impl LifecycleHook + 'static) {
        self.hooks.push(Box::new(hook));
    }

    /// Root shutdown state handed to every hook.
    pub fn root(&self) -> &ShutdownState {
        &self.root
    }

    /// Starts every hook in order.
    pub async fn start(&mut self) -> Result<(), LifecycleError> {
        if self.started > 0 {
            return Err(LifecycleError::AlreadyStarted);
        }

        for index in 0..self.hooks.len() {
            let hook = &self.hooks[index];
            info!("▶️ Starting component: {}", hook.name());
            if let Err(e) = hook.on_start(&self.root).await {
                error!("❌ Failed to start component {}: {}", hook.name(), e);
                let failure = LifecycleError::StartFailed {
                    name: hook.name().to_string(),
                    reason: e.to_string(),
                };
                self.stop().await;
                return Err(failure);
            }
            self.started += 1;
        }
        Ok(())
    }

    /// Raises the root shutdown state and stops started hooks in reverse.
    pub async fn stop(&mut self) {
        self.root.initiate_shutdown();
        let deadline = Instant::now() + self.grace;

        for hook in self.hooks[..self.started].iter().rev() {
            info!("⏹️ Stopping component: {}", hook.name());
            let remaining = deadline.saturating_duration_since(Instant::now());
            if let Err(e) = hook.on_stop(remaining).await {
                error!("❌ Failed to stop component {}: {}", hook.name(), e);
            }
        }
        self.started = 0;
        self.root.complete_shutdown();
    }

    /// Starts everything, waits for `shutdown` to resolve, then stops.
    pub async fn run<F>(mut self, shutdown: F) -> Result<(), LifecycleError>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        info!("✅ All components started");
        shutdown.await;
        self.stop().await;
        info!("✅ Shutdown complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    type Journal = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        journal: Journal,
        fail_start: bool,
        fail_stop: bool,
    }

    impl Recorder {
        fn new(name: &'static str, journal: &Journal) -> Self {
            Self {
                name,
                journal: journal.clone(),
                fail_start: false,
                fail_stop: false,
            }
        }

        fn record(&self, event: &str) {
            self.journal.lock().unwrap().push(format!("{event} {}", self.name));
        }
    }

    #[async_trait]
    impl LifecycleHook for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        async fn on_start(&self, root: &ShutdownState) -> Result<(), HookError> {
            assert!(!root.is_shutdown_initiated());
            self.record("start");
            if self.fail_start {
                return Err("boom".into());
            }
            Ok(())
        }

        async fn on_stop(&self, _grace: Duration) -> Result<(), HookError> {
            self.record("stop");
            if self.fail_stop {
                return Err("stuck".into());
            }
            Ok(())
        }
    }

    fn entries(journal: &Journal) -> Vec<String> {
        journal.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn starts_in_order_and_stops_in_reverse() {
        let journal = Journal::default();
        let mut lifecycle = Lifecycle::new(Duration::from_secs(1));
        lifecycle.append(Recorder::new("a", &journal));
        lifecycle.append(Recorder::new("b", &journal));
        lifecycle.append(Recorder::new("c", &journal));
        let root = lifecycle.root().clone();

        lifecycle.run(async {}).await.unwrap();

        assert_eq!(
            entries(&journal),
            ["start a", "start b", "start c", "stop c", "stop b", "stop a"]
        );
        assert!(root.is_shutdown_initiated());
        assert!(root.is_shutdown_complete());
    }

    #[tokio::test]
    async fn start_failure_aborts_and_unwinds() {
        let journal = Journal::default();
        let mut lifecycle = Lifecycle::new(Duration::from_secs(1));
        lifecycle.append(Recorder::new("a", &journal));
        lifecycle.append(Recorder {
            fail_start: true,
            ..Recorder::new("b", &journal)
        });
        lifecycle.append(Recorder::new("c", &journal));

        let err = lifecycle.start().await.unwrap_err();
        assert!(matches!(err, LifecycleError::StartFailed { ref name, .. } if name == "b"));
        assert_eq!(entries(&journal), ["start a", "start b", "stop a"]);
    }

    #[tokio::test]
    async fn stop_failures_do_not_block_other_hooks() {
        let journal = Journal::default();
        let mut lifecycle = Lifecycle::new(Duration::from_secs(1));
        lifecycle.append(Recorder::new("a", &journal));
        lifecycle.append(Recorder {
            fail_stop: true,
            ..Recorder::new("b", &journal)
        });

        lifecycle.start().await.unwrap();
        lifecycle.stop().await;

        assert_eq!(entries(&journal), ["start a", "start b", "stop b", "stop a"]);
    }

    #[tokio::test]
    async fn cannot_start_twice() {
        let journal = Journal::default();
        let mut lifecycle = Lifecycle::new(Duration::from_secs(1));
        lifecycle.append(Recorder::new("a", &journal));

        lifecycle.start().await.unwrap();
        assert!(matches!(lifecycle.start().await, Err(LifecycleError::AlreadyStarted)));
    }
}

//! Registry of live sessions for one listener.
//!
//! The registry tracks each connection from the moment its session actor is
//! spawned until its pumps have finished, and lets the listener hang every
//! connection up and wait for them to drain during shutdown.

use dashmap::DashMap;
use overmind_kit::ShutdownState;
use std::net::SocketAddr;
use std::time::{Duration, SystemTime};
use tokio::sync::Notify;
use tracing::{info, warn};

/// Metadata about one live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: i64,
    /// Transport name, `"ws"` or `"tcp"`
    pub protocol: &'static str,
    pub remote_addr: SocketAddr,
    pub connected_at: SystemTime,
}

#[derive(Debug)]
struct Entry {
    info: SessionInfo,
    hangup: ShutdownState,
}

/// Concurrent map of live sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<i64, Entry>,
    changed: Notify,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a session together with its hang-up signal.
    pub fn register(&self, info: SessionInfo, hangup: ShutdownState) {
        info!(
            "🔗 Session {} ({}) from {}",
            info.session_id, info.protocol, info.remote_addr
        );
        self.sessions.insert(info.session_id, Entry { info, hangup });
    }

    /// Forgets a session. Returns its metadata if it was present.
    pub fn remove(&self, session_id: i64) -> Option<SessionInfo> {
        let removed = self.sessions.remove(&session_id).map(|(_, entry)| entry.info);
        if let Some(info) = &removed {
            info!(
                "❌ Session {} from {} disconnected",
                info.session_id, info.remote_addr
            );
        }
        self.changed.notify_waiters();
        removed
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Hangs up every live session and returns how many there were.
    pub fn hang_up_all(&self) -> usize {
        let mut count = 0;
        for entry in self.sessions.iter() {
            entry.hangup.initiate_shutdown();
            count += 1;
        }
        count
    }

    /// Waits until no session is left, for at most `within`.
    ///
    /// Returns true if the registry drained in time.
    pub async fn wait_empty(&self, within: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + within;
        loop {
            let changed = self.changed.notified();
            tokio::pin!(changed);
            changed.as_mut().enable();
            if self.is_empty() {
                return true;
            }
            if tokio::time::timeout_at(deadline, changed).await.is_err() {
                warn!("⏰ {} session(s) still open after {:?}", self.len(), within);
                return false;
            }
        }
    }
}

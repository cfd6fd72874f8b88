//! Per-connection session data.

use overmind_kit::ShutdownState;
use tokio::sync::mpsc;
use tracing::warn;

/// Handshake progress. Moves from `PreAuth` to `Authenticated` only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeState {
    PreAuth,
    Authenticated,
}

/// Why an outbound item was not queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EnqueueError {
    /// The queue is at capacity; the item was dropped
    #[error("outbound queue full")]
    Full,
    /// The outbound pump is gone
    #[error("outbound queue closed")]
    Closed,
}

/// State of one client connection. Owned by its session actor.
#[derive(Debug)]
pub struct Session {
    id: i64,
    protocol: &'static str,
    outbound: mpsc::Sender<Vec<u8>>,
    hangup: ShutdownState,
    state: HandshakeState,
}

impl Session {
    /// Creates a session in the `PreAuth` state.
    ///
    /// # Arguments
    ///
    /// * `id` - Process-unique session id
    /// * `protocol` - Transport name, `"ws"` or `"tcp"`
    /// * `outbound` - Sending half of the connection's outbound queue
    /// * `hangup` - Signal observed by the connection's pumps
    pub fn new(
        id: i64,
        protocol: &'static str,
        outbound: mpsc::Sender<Vec<u8>>,
        hangup: ShutdownState,
    ) -> Self {
        Self {
            id,
            protocol,
            outbound,
            hangup,
            state: HandshakeState::PreAuth,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn protocol(&self) -> &'static str {
        self.protocol
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Marks the handshake as done. Idempotent.
    pub fn authenticate(&mut self) {
        self.state = HandshakeState::Authenticated;
    }

    /// Queues an encoded frame without waiting.
    ///
    /// A full queue drops `frame`; earlier items stay queued in order.
    pub fn enqueue(&self, frame: Vec<u8>) -> Result<(), EnqueueError> {
        self.outbound.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                warn!("📪 Outbound queue full, dropping message for session {}", self.id);
                EnqueueError::Full
            }
            mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }

    /// Asks both pumps of this connection to wind down.
    pub fn hang_up(&self) {
        self.hangup.initiate_shutdown();
    }
}

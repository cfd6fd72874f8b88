//! Transport adapters: the inbound and outbound pumps of one connection.
//!
//! Each connection runs two pumps. The inbound pump reads physical frames,
//! decodes them and hands the packets to the session actor through a
//! [`PacketSink`]. The outbound pump drains the session's bounded queue onto
//! the socket. Both also watch the connection's hang-up signal.

pub mod tcp;
pub mod ws;

use crate::protocol::{decode, CipherKey};
use crate::session::SessionMessage;
use ractor::ActorRef;
use tracing::debug;

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The peer announced a frame larger than the limit
    #[error("frame of {len} bytes exceeds limit of {max}")]
    Oversized { len: usize, max: usize },

    /// Nothing arrived within the read deadline
    #[error("read deadline exceeded")]
    ReadTimeout,

    /// A write did not finish within the write deadline
    #[error("write deadline exceeded")]
    WriteTimeout,

    /// The session actor is gone
    #[error("session actor stopped")]
    SessionClosed,
}

/// Decodes physical frames and delivers them to a session actor.
#[derive(Debug, Clone)]
pub struct PacketSink {
    key: CipherKey,
    actor: ActorRef<SessionMessage>,
}

impl PacketSink {
    pub fn new(key: CipherKey, actor: ActorRef<SessionMessage>) -> Self {
        Self { key, actor }
    }

    /// Decodes `raw` and forwards the packet.
    ///
    /// A malformed frame is logged and skipped. Only a stopped actor is an
    /// error, since there is nobody left to read for.
    pub fn deliver(&self, raw: &[u8]) -> Result<(), TransportError> {
        match decode(raw, &self.key) {
            Ok(packet) => self
                .actor
                .cast(packet.into())
                .map_err(|_| TransportError::SessionClosed),
            Err(e) => {
                debug!("🧩 Dropping malformed frame of {} bytes: {}", raw.len(), e);
                Ok(())
            }
        }
    }
}

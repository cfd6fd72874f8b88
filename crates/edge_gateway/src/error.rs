//! Error types for the gateway's listeners.
//!
//! Frame-level problems never show up here: codec and routing errors are
//! logged where they happen and the frame is dropped. A [`GatewayError`] is
//! what escapes a listener or a connection setup.

use ractor::SpawnErr;

/// Errors surfaced by gateway servers.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The listener could not bind its address
    #[error("Failed to bind {addr}: {reason}")]
    BindFailed { addr: String, reason: String },

    /// Socket-level errors after the listener is up
    #[error("Network error: {0}")]
    Network(String),

    /// A session actor could not be spawned
    #[error("Actor error: {0}")]
    Actor(#[from] SpawnErr),

    /// Invalid gateway configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

//! # Edge Gateway
//!
//! Terminates client connections for the Overmind backend and bridges them
//! into `ractor` actors. The gateway holds no game logic; it authenticates
//! the wire format, keeps one session actor per connection and forwards
//! requests to the backend actors.
//!
//! ## Architecture Overview
//!
//! * **Wire codec** ([`protocol`]) - checksum, AES-ECB and frame layout
//! * **Session actor** ([`session`]) - per-connection state machine
//! * **Routing bridge** ([`routing`]) - packet to envelope translation
//! * **Transports** ([`transport`]) - inbound and outbound pumps per socket
//! * **Listeners** ([`server`]) - WebSocket and TCP accept loops
//!
//! ## Connection Flow
//!
//! 1. A listener accepts a socket and spawns a session actor named
//!    `channel-<protocol>-<session id>`
//! 2. The inbound pump decodes each frame and posts the packet to the actor
//! 3. The actor answers handshakes and heartbeats itself and forwards the
//!    rest to the portal or world actor, with itself as reply address
//! 4. Replies are re-encoded by the actor and queued on the bounded
//!    outbound channel, which the outbound pump writes to the socket
//!
//! ## Error Handling
//!
//! A malformed frame or an untranslatable message only costs that message.
//! Socket errors end one connection. Only a bind failure ([`GatewayError`])
//! stops a listener from starting.

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use protocol::{CipherKey, CodecError, Packet};
pub use routing::Backends;
pub use server::{NetworkServer, SessionRegistry, TcpServer, WsServer};

pub mod config;
pub mod error;
pub mod protocol;
pub mod routing;
pub mod server;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

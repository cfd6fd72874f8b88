//! Gateway configuration types and defaults.
//!
//! The process binary loads its own TOML configuration and converts it into
//! a [`GatewayConfig`]; this crate never reads files or the environment.

use crate::protocol::CipherKey;
use std::net::SocketAddr;
use std::time::Duration;

/// Runtime settings shared by the WebSocket and TCP servers.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address the WebSocket server binds to
    pub ws_bind_address: SocketAddr,

    /// Address the TCP server binds to
    pub tcp_bind_address: SocketAddr,

    /// Request path accepted for WebSocket upgrades
    pub ws_path: String,

    /// Largest inbound frame, in bytes, on either transport
    pub max_frame_size: usize,

    /// Capacity of each connection's outbound queue
    pub outbound_capacity: usize,

    /// WebSocket read deadline, extended on every pong
    pub pong_wait: Duration,

    /// Upper bound on a single socket write
    pub write_wait: Duration,

    /// TCP read deadline; `None` disables it
    pub tcp_idle_timeout: Option<Duration>,

    /// Key clients encrypt their frames with
    pub shared_key: CipherKey,

    /// Refuse to forward frames before a handshake
    pub require_handshake: bool,
}

impl GatewayConfig {
    /// Interval between WebSocket pings: nine tenths of `pong_wait`.
    pub fn ping_period(&self) -> Duration {
        self.pong_wait * 9 / 10
    }

    /// Checks the settings for values the servers cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.outbound_capacity == 0 {
            return Err("Outbound capacity must be greater than 0".to_string());
        }
        if self.max_frame_size == 0 || self.max_frame_size > usize::from(u16::MAX) {
            return Err(format!(
                "Max frame size must be between 1 and {} bytes",
                u16::MAX
            ));
        }
        if !self.ws_path.starts_with('/') {
            return Err(format!("WebSocket path must start with '/': {}", self.ws_path));
        }
        if self.pong_wait.is_zero() || self.write_wait.is_zero() {
            return Err("Pong wait and write wait must be non-zero".to_string());
        }
        Ok(())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            ws_bind_address: SocketAddr::from(([0, 0, 0, 0], 8080)),
            tcp_bind_address: SocketAddr::from(([0, 0, 0, 0], 8081)),
            ws_path: "/ws".to_string(),
            max_frame_size: 4096,
            outbound_capacity: 256,
            pong_wait: Duration::from_secs(60),
            write_wait: Duration::from_secs(10),
            tcp_idle_timeout: Some(Duration::from_secs(180)),
            shared_key: CipherKey::development(),
            require_handshake: false,
        }
    }
}

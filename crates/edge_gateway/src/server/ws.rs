//! WebSocket listener.

use super::{Listener, NetworkServer, SessionRegistry};
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::routing::Backends;
use crate::transport::ws::{self, WsTiming};
use crate::transport::PacketSink;
use async_trait::async_trait;
use futures_util::StreamExt;
use overmind_kit::{Logger, ShutdownState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::accept_hdr_async_with_config;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tracing::{debug, error};

/// WebSocket server accepting binary frames on one path.
pub struct WsServer {
    core: Arc<Listener>,
}

impl WsServer {
    /// Creates a server bound to `config.ws_bind_address` once started.
    pub fn new(config: Arc<GatewayConfig>, backends: Backends, logger: &Logger) -> Self {
        let bind_address = config.ws_bind_address;
        Self {
            core: Arc::new(Listener::new("ws", bind_address, config, backends, logger)),
        }
    }
}

#[async_trait]
impl NetworkServer for WsServer {
    async fn start(&self, root: ShutdownState) -> Result<(), GatewayError> {
        self.core.start(root, serve).await
    }

    async fn stop(&self, grace: Duration) -> Result<(), GatewayError> {
        self.core.stop(grace).await
    }

    fn protocol(&self) -> &'static str {
        self.core.protocol()
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.core.local_addr()
    }

    fn registry(&self) -> &SessionRegistry {
        self.core.registry()
    }
}

/// Socket limits applied to every upgraded connection.
fn socket_config(max_frame_size: usize) -> WebSocketConfig {
    WebSocketConfig::default()
        .max_message_size(Some(max_frame_size))
        .max_frame_size(Some(max_frame_size))
}

async fn serve(core: Arc<Listener>, stream: TcpStream, remote_addr: SocketAddr) {
    let _ = stream.set_nodelay(true);
    let config = core.config();

    let path = config.ws_path.clone();
    let check_path = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        if request.uri().path() == path {
            return Ok(response);
        }
        debug!("Rejecting upgrade on {}", request.uri().path());
        let mut rejection = ErrorResponse::new(Some("Not Found".to_string()));
        *rejection.status_mut() = StatusCode::NOT_FOUND;
        Err(rejection)
    };

    let upgrade = accept_hdr_async_with_config(stream, check_path, Some(socket_config(config.max_frame_size)));
    let socket = match timeout(config.pong_wait, upgrade).await {
        Ok(Ok(socket)) => socket,
        Ok(Err(e)) => {
            debug!("WebSocket upgrade from {} failed: {}", remote_addr, e);
            return;
        }
        Err(_) => {
            debug!("WebSocket upgrade from {} timed out", remote_addr);
            return;
        }
    };

    let session = match core.open_session(remote_addr).await {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to open WebSocket session for {}: {}", remote_addr, e);
            return;
        }
    };

    let timing = WsTiming {
        write_wait: config.write_wait,
        ping_period: config.ping_period(),
    };
    let sink = PacketSink::new(config.shared_key.clone(), session.actor.clone());
    let logger = session.logger.clone();
    let (socket_tx, socket_rx) = socket.split();

    let writer = tokio::spawn(logger.instrument(ws::write_loop(
        socket_tx,
        session.outbound,
        session.hangup.clone(),
        timing,
    )));
    let result = logger
        .instrument(ws::read_loop(socket_rx, &sink, config.pong_wait, &session.hangup))
        .await;

    core.close_session(session.session_id, session.actor, session.hangup, writer, result)
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_limits_follow_the_frame_size() {
        let config = socket_config(4096);
        assert_eq!(config.max_message_size, Some(4096));
        assert_eq!(config.max_frame_size, Some(4096));
    }
}

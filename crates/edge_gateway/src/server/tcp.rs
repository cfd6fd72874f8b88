//! Length-prefixed TCP listener.

use super::{Listener, NetworkServer, SessionRegistry};
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::routing::Backends;
use crate::transport::tcp::{self, TcpLimits};
use crate::transport::PacketSink;
use async_trait::async_trait;
use overmind_kit::{Logger, ShutdownState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::error;

/// Raw TCP server speaking the length-prefixed framing.
pub struct TcpServer {
    core: Arc<Listener>,
}

impl TcpServer {
    /// Creates a server bound to `config.tcp_bind_address` once started.
    pub fn new(config: Arc<GatewayConfig>, backends: Backends, logger: &Logger) -> Self {
        let bind_address = config.tcp_bind_address;
        Self {
            core: Arc::new(Listener::new("tcp", bind_address, config, backends, logger)),
        }
    }
}

#[async_trait]
impl NetworkServer for TcpServer {
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

async fn serve(core: Arc<Listener>, stream: TcpStream, remote_addr: SocketAddr) {
    let _ = stream.set_nodelay(true);
    let session = match core.open_session(remote_addr).await {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to open TCP session for {}: {}", remote_addr, e);
            return;
        }
    };

    let config = core.config();
    let limits = TcpLimits {
        max_frame_size: config.max_frame_size,
        idle_timeout: config.tcp_idle_timeout,
    };
    let sink = PacketSink::new(config.shared_key.clone(), session.actor.clone());
    let logger = session.logger.clone();
    let (read_half, write_half) = stream.into_split();

    let writer = tokio::spawn(logger.instrument(tcp::write_loop(
        write_half,
        session.outbound,
        session.hangup.clone(),
        config.write_wait,
    )));
    let result = logger
        .instrument(tcp::read_loop(read_half, &sink, limits, &session.hangup))
        .await;

    core.close_session(session.session_id, session.actor, session.hangup, writer, result)
        .await;
}

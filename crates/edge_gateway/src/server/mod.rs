//! Listeners for each transport.
//!
//! Both servers share a [`Listener`] core that owns the accept loop, spawns
//! one session actor per connection and tracks connections in a
//! [`SessionRegistry`]. The transport-specific part is only how a connection
//! is upgraded and which pumps run on it.

pub mod registry;
pub mod tcp;
pub mod ws;

pub use registry::{SessionInfo, SessionRegistry};
pub use tcp::TcpServer;
pub use ws::WsServer;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::routing::Backends;
use crate::session::{next_session_id, Session, SessionActor, SessionMessage, SessionState};
use crate::transport::TransportError;
use async_trait::async_trait;
use overmind_kit::{Logger, ShutdownState};
use ractor::{Actor, ActorRef};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, SystemTime};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, error, info, warn};

/// Uniform control surface of a transport listener.
#[async_trait]
pub trait NetworkServer: Send + Sync {
    /// Binds and spawns the accept loop, then returns.
    ///
    /// The accept loop also ends when `root` is raised.
    async fn start(&self, root: ShutdownState) -> Result<(), GatewayError>;

    /// Closes the listener, hangs up live connections and waits up to
    /// `grace` for them to finish. Succeeds even if some are still draining.
    async fn stop(&self, grace: Duration) -> Result<(), GatewayError>;

    /// Transport name, `"ws"` or `"tcp"`.
    fn protocol(&self) -> &'static str;

    /// Bound address, once started.
    fn local_addr(&self) -> Option<SocketAddr>;

    /// Live sessions of this listener.
    fn registry(&self) -> &SessionRegistry;
}

/// Everything a connection task needs after its session actor is up.
pub(crate) struct OpenSession {
    pub session_id: i64,
    pub actor: ActorRef<SessionMessage>,
    pub outbound: mpsc::Receiver<Vec<u8>>,
    pub hangup: ShutdownState,
    pub logger: Logger,
}

/// State shared by the accept loop and every connection of one listener.
pub(crate) struct Listener {
    protocol: &'static str,
    bind_address: SocketAddr,
    config: Arc<GatewayConfig>,
    backends: Backends,
    registry: SessionRegistry,
    closing: ShutdownState,
    accept_task: Mutex<Option<JoinHandle<()>>>,
    local_addr: OnceLock<SocketAddr>,
    logger: Logger,
}

impl Listener {
    pub(crate) fn new(
        protocol: &'static str,
        bind_address: SocketAddr,
        config: Arc<GatewayConfig>,
        backends: Backends,
        logger: &Logger,
    ) -> Self {
        Self {
            protocol,
            bind_address,
            config,
            backends,
            registry: SessionRegistry::new(),
            closing: ShutdownState::new(),
            accept_task: Mutex::new(None),
            local_addr: OnceLock::new(),
            logger: logger.clone(),
        }
    }

    pub(crate) fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub(crate) fn protocol(&self) -> &'static str {
        self.protocol
    }

    pub(crate) fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    /// Binds the listener and spawns the accept loop.
    ///
    /// # Arguments
    ///
    /// * `root` - Process shutdown state; raising it ends the accept loop
    /// * `serve` - Runs one accepted connection to completion
    pub(crate) async fn start<F, Fut>(self: &Arc<Self>, root: ShutdownState, serve: F) -> Result<(), GatewayError>
    where
        F: Fn(Arc<Listener>, TcpStream, SocketAddr) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut task = self.accept_task.lock().await;
        if task.is_some() || self.closing.is_shutdown_initiated() {
            return Err(GatewayError::Network(format!(
                "{} server cannot be started twice",
                self.protocol
            )));
        }

        let listener = TcpListener::bind(self.bind_address)
            .await
            .map_err(|e| GatewayError::BindFailed {
                addr: self.bind_address.to_string(),
                reason: e.to_string(),
            })?;
        let local = listener
            .local_addr()
            .map_err(|e| GatewayError::Network(format!("Failed to read local address: {e}")))?;
        let _ = self.local_addr.set(local);
        info!("🚀 Starting {} server on {}", self.protocol, local);

        let core = self.clone();
        *task = Some(tokio::spawn(
            self.logger.instrument(accept_loop(core, listener, root, serve)),
        ));
        Ok(())
    }

    /// Stops accepting, hangs up every connection and waits for them.
    pub(crate) async fn stop(&self, grace: Duration) -> Result<(), GatewayError> {
        info!("🛑 Stopping {} server...", self.protocol);
        let deadline = Instant::now() + grace;
        self.closing.initiate_shutdown();

        if let Some(task) = self.accept_task.lock().await.take() {
            if timeout_at(deadline, task).await.is_err() {
                warn!("{} accept loop did not exit in time", self.protocol);
            }
        }

        let open = self.registry.hang_up_all();
        if open > 0 {
            info!("🔌 Hanging up {} {} connection(s)", open, self.protocol);
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if !self.registry.wait_empty(remaining).await {
            warn!(
                "{} {} connection(s) still draining after grace period",
                self.registry.len(),
                self.protocol
            );
        }
        info!("✅ {} server stopped", self.protocol);
        Ok(())
    }

    /// Creates the session, spawns its actor and registers the connection.
    ///
    /// The actor is registered as `channel-<protocol>-<session id>`.
    pub(crate) async fn open_session(&self, remote_addr: SocketAddr) -> Result<OpenSession, GatewayError> {
        let session_id = next_session_id();
        let (tx, outbound) = mpsc::channel(self.config.outbound_capacity);
        let hangup = ShutdownState::new();
        let logger = self.logger.session(self.protocol, session_id);

        let state = SessionState {
            session: Session::new(session_id, self.protocol, tx, hangup.clone()),
            logger: logger.clone(),
        };
        let handler = SessionActor::new(self.backends.clone(), self.config.require_handshake);
        let name = format!("channel-{}-{}", self.protocol, session_id);
        let (actor, _) = Actor::spawn(Some(name), handler, state).await?;

        self.registry.register(
            SessionInfo {
                session_id,
                protocol: self.protocol,
                remote_addr,
                connected_at: SystemTime::now(),
            },
            hangup.clone(),
        );
        // A connection accepted just before stop() must not outlive it.
        if self.closing.is_shutdown_initiated() {
            hangup.initiate_shutdown();
        }

        Ok(OpenSession {
            session_id,
            actor,
            outbound,
            hangup,
            logger,
        })
    }

    /// Tears a connection down once its inbound pump has returned.
    pub(crate) async fn close_session(
        &self,
        session_id: i64,
        actor: ActorRef<SessionMessage>,
        hangup: ShutdownState,
        writer: JoinHandle<Result<(), TransportError>>,
        read_result: Result<(), TransportError>,
    ) {
        match read_result {
            Ok(()) => debug!("Session {} reader finished", session_id),
            Err(e) => info!("Session {} closed: {}", session_id, e),
        }

        actor.stop(None);
        hangup.initiate_shutdown();

        let abort = writer.abort_handle();
        match timeout(self.config.write_wait, writer).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => debug!("Session {} writer failed: {}", session_id, e),
            Ok(Err(e)) => error!("Session {} writer task panicked: {}", session_id, e),
            Err(_) => {
                warn!("Session {} writer did not finish, aborting", session_id);
                abort.abort();
            }
        }

        self.registry.remove(session_id);
    }
}

async fn accept_loop<F, Fut>(core: Arc<Listener>, listener: TcpListener, root: ShutdownState, serve: F)
where
    F: Fn(Arc<Listener>, TcpStream, SocketAddr) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    loop {
        let accepted = tokio::select! {
            _ = core.closing.wait() => break,
            _ = root.wait() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, remote_addr)) => {
                debug!("Accepted {} connection from {}", core.protocol, remote_addr);
                tokio::spawn(serve(core.clone(), stream, remote_addr));
            }
            Err(e) => {
                if !core.closing.is_shutdown_initiated() {
                    error!("{} accept error: {}", core.protocol, e);
                }
                break;
            }
        }
    }
    debug!("{} accept loop exited", core.protocol);
}

//! Main application logic and component wiring.
//!
//! The `Application` turns the validated configuration into two lifecycle
//! components: the backend actors, then the gateway servers in front of
//! them. The servers find the backends through the `ractor` registry.
//! Shutdown runs the other way round so no connection outlives the actors
//! it talks to.

use crate::lifecycle::{HookError, Lifecycle, LifecycleHook};
use crate::signals::{wait_for_shutdown_signal, wait_for_shutdown_signal_silent};
use crate::{config::AppConfig, logging::display_banner};
use async_trait::async_trait;
use backend_actors::{PortalActor, WorldActor};
use edge_gateway::routing::{PORTAL_ACTOR, WORLD_ACTOR};
use edge_gateway::{Backends, GatewayConfig, NetworkServer, TcpServer, WsServer};
use overmind_kit::{Logger, ShutdownState};
use ractor::{Actor, ActorCell};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Fully configured process, ready to run.
pub struct Application {
    config: AppConfig,
    gateway: Arc<GatewayConfig>,
    logger: Logger,
}

impl Application {
    /// Validates the merged configuration and prepares the gateway settings.
    ///
    /// # Arguments
    ///
    /// * `config` - Configuration after file, environment and CLI overrides
    ///
    /// # Returns
    ///
    /// A configured `Application`, or an error if the configuration is unusable.
    pub fn new(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("✅ Configuration loaded and validated successfully");

        display_banner();

        let gateway = Arc::new(config.to_gateway_config()?);
        let logger = Logger::new(&config.server.name);
        Ok(Self {
            config,
            gateway,
            logger,
        })
    }

    /// Starts every component, waits for a termination signal and shuts
    /// down gracefully.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("🌟 Starting Overmind server ({})", self.config.server.env);
        self.log_configuration_summary();

        let mut lifecycle = Lifecycle::new(self.config.shutdown.grace());
        lifecycle.append(BackendActors::new(BackendNames::default(), self.logger.clone()));
        lifecycle.append(GatewayServers::new(
            self.gateway.clone(),
            BackendNames::default(),
            self.logger.clone(),
        ));

        let ws = self.gateway.ws_bind_address;
        let tcp = self.gateway.tcp_bind_address;
        let ws_path = self.gateway.ws_path.clone();
        lifecycle
            .run(async move {
                info!("✅ Overmind server is now running!");
                info!("🎮 WebSocket: ws://{}{} | TCP: {}", ws, ws_path, tcp);
                info!("🛑 Press Ctrl+C to gracefully shutdown");

                if let Err(e) = wait_for_shutdown_signal().await {
                    error!("❌ Failed to listen for shutdown signals: {}", e);
                    return;
                }

                tokio::spawn(async {
                    if let Err(e) = wait_for_shutdown_signal_silent().await {
                        error!("Failed to set up forced shutdown signal handler: {e}");
                        return;
                    }
                    warn!("Shutdown signal received again, exiting immediately");
                    std::process::exit(1);
                });
            })
            .await?;

        info!("👋 Overmind server stopped");
        Ok(())
    }

    fn log_configuration_summary(&self) {
        info!("📋 Configuration Summary:");
        info!("  🌐 WebSocket: {}{}", self.gateway.ws_bind_address, self.gateway.ws_path);
        info!("  🔌 TCP: {}", self.gateway.tcp_bind_address);
        info!("  📦 Max frame size: {} bytes", self.gateway.max_frame_size);
        info!("  📬 Outbound queue: {} per connection", self.gateway.outbound_capacity);
        info!(
            "  ⏱️ Pong wait: {:?} | Write wait: {:?} | TCP idle: {:?}",
            self.gateway.pong_wait, self.gateway.write_wait, self.gateway.tcp_idle_timeout
        );
        info!("  🤝 Handshake required: {}", self.gateway.require_handshake);
        info!("  🛑 Shutdown grace: {}s", self.config.shutdown.grace_secs);
    }
}

/// Registry names the backend actors are spawned and looked up under.
#[derive(Debug, Clone)]
struct BackendNames {
    portal: String,
    world: String,
}

impl Default for BackendNames {
    fn default() -> Self {
        Self {
            portal: PORTAL_ACTOR.to_string(),
            world: WORLD_ACTOR.to_string(),
        }
    }
}

/// Spawns the portal and world actors under their routing names.
struct BackendActors {
    names: BackendNames,
    logger: Logger,
    running: Mutex<Vec<ActorCell>>,
}

impl BackendActors {
    fn new(names: BackendNames, logger: Logger) -> Self {
        Self {
            names,
            logger,
            running: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LifecycleHook for BackendActors {
    fn name(&self) -> &str {
        "Backend Actors"
    }

    async fn on_start(&self, _root: &ShutdownState) -> Result<(), HookError> {
        let (portal, _) = Actor::spawn(Some(self.names.portal.clone()), PortalActor::new(), self.logger.clone()).await?;
        let world = match Actor::spawn(Some(self.names.world.clone()), WorldActor::new(), self.logger.clone()).await {
            Ok((world, _)) => world,
            Err(e) => {
                portal.stop(None);
                return Err(e.into());
            }
        };

        self.running
            .lock()
            .await
            .extend([portal.get_cell(), world.get_cell()]);
        info!("🎭 Backend actors ready: {}, {}", self.names.portal, self.names.world);
        Ok(())
    }

    async fn on_stop(&self, grace: Duration) -> Result<(), HookError> {
        let running = std::mem::take(&mut *self.running.lock().await);
        info!("🛑 Stopping {} backend actor(s)", running.len());
        let results =
            futures::future::join_all(running.iter().map(|actor| actor.stop_and_wait(None, Some(grace)))).await;

        let stuck: Vec<String> = running
            .iter()
            .zip(results)
            .filter(|(_, result)| result.is_err())
            .map(|(actor, _)| actor.get_name().unwrap_or_else(|| actor.get_id().to_string()))
            .collect();
        if stuck.is_empty() {
            Ok(())
        } else {
            Err(format!("still running after {:?}: {}", grace, stuck.join(", ")).into())
        }
    }
}

/// Starts the WebSocket and TCP servers in front of the backends.
struct GatewayServers {
    config: Arc<GatewayConfig>,
    names: BackendNames,
    logger: Logger,
    servers: Mutex<Vec<Box<dyn NetworkServer>>>,
}

impl GatewayServers {
    fn new(config: Arc<GatewayConfig>, names: BackendNames, logger: Logger) -> Self {
        Self {
            config,
            names,
            logger,
            servers: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LifecycleHook for GatewayServers {
    fn name(&self) -> &str {
        "Gateway Servers"
    }

    async fn on_start(&self, root: &ShutdownState) -> Result<(), HookError> {
        let backends = Backends::lookup(&self.names.portal, &self.names.world).ok_or("backend actors are not running")?;

        let candidates: Vec<Box<dyn NetworkServer>> = vec![
            Box::new(WsServer::new(self.config.clone(), backends.clone(), &self.logger)),
            Box::new(TcpServer::new(self.config.clone(), backends, &self.logger)),
        ];

        let mut servers = self.servers.lock().await;
        for server in candidates {
            if let Err(e) = server.start(root.clone()).await {
                for started in servers.drain(..) {
                    if let Err(stop_err) = started.stop(self.config.write_wait).await {
                        warn!("{} server failed to stop: {}", started.protocol(), stop_err);
                    }
                }
                return Err(e.into());
            }
            servers.push(server);
        }
        Ok(())
    }

    async fn on_stop(&self, grace: Duration) -> Result<(), HookError> {
        let servers = std::mem::take(&mut *self.servers.lock().await);
        let results = futures::future::join_all(servers.iter().map(|s| s.stop(grace))).await;

        let mut failed = Vec::new();
        for (server, result) in servers.iter().zip(results) {
            if let Err(e) = result {
                error!("❌ {} server failed to stop: {}", server.protocol(), e);
                failed.push(server.protocol());
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(format!("failed to stop: {}", failed.join(", ")).into())
        }
    }
}

//! Configuration management for the Overmind server.
//!
//! This module handles loading, environment overrides, validation and
//! conversion of the server configuration into the gateway's runtime types.
//! Precedence, lowest first: built-in defaults, the TOML file, `OVERMIND_`
//! environment variables, command-line flags.

use edge_gateway::protocol::DEV_SHARED_KEY;
use edge_gateway::{CipherKey, GatewayConfig};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Prefix of every environment override.
pub const ENV_PREFIX: &str = "OVERMIND";

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Listener settings
    #[serde(default)]
    pub server: ServerSettings,
    /// Socket and framing settings
    #[serde(default)]
    pub transport: TransportSettings,
    /// Wire encryption settings
    #[serde(default)]
    pub crypto: CryptoSettings,
    /// Session policy settings
    #[serde(default)]
    pub session: SessionSettings,
    /// Logging configuration settings
    #[serde(default)]
    pub logging: LoggingSettings,
    /// Shutdown settings
    #[serde(default)]
    pub shutdown: ShutdownSettings,
}

/// Server-specific configuration settings.
///
/// The WebSocket server binds `host:port`, the TCP server `host:port + 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Service name attached to every log line
    pub name: String,
    /// Interface to bind both listeners to
    pub host: String,
    /// WebSocket port; TCP listens on the next port
    pub port: u16,
    /// Deployment environment label (dev, test, prod)
    pub env: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            name: "overmind-server".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            env: "dev".to_string(),
        }
    }
}

/// Socket, framing and timeout settings shared by both transports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// Request path accepted for WebSocket upgrades
    pub ws_path: String,
    /// Largest inbound frame in bytes
    pub max_frame_size: usize,
    /// Per-connection outbound queue capacity
    pub outbound_capacity: usize,
    /// WebSocket read deadline in seconds, extended on every pong
    pub pong_wait_secs: u64,
    /// Socket write deadline in seconds
    pub write_wait_secs: u64,
    /// TCP read deadline in seconds (0 disables it)
    pub tcp_idle_timeout_secs: u64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            ws_path: "/ws".to_string(),
            max_frame_size: 4096,
            outbound_capacity: 256,
            pong_wait_secs: 60,
            write_wait_secs: 10,
            tcp_idle_timeout_secs: 180,
        }
    }
}

/// Wire encryption settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoSettings {
    /// AES key shared with clients; 16, 24 or 32 bytes
    pub shared_key: String,
}

impl Default for CryptoSettings {
    fn default() -> Self {
        Self {
            shared_key: String::from_utf8_lossy(DEV_SHARED_KEY).into_owned(),
        }
    }
}

impl std::fmt::Debug for CryptoSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoSettings")
            .field("shared_key", &"<redacted>")
            .finish()
    }
}

/// Session policy settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Refuse to forward requests before a handshake
    pub require_handshake: bool,
}

/// Logging system configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "debug".to_string(),
            json_format: false,
        }
    }
}

/// Graceful shutdown settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownSettings {
    /// Seconds the servers and actors get to drain after a stop signal
    pub grace_secs: u64,
}

impl Default for ShutdownSettings {
    fn default() -> Self {
        Self { grace_secs: 10 }
    }
}

impl ShutdownSettings {
    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, creates a default configuration file at the specified path
    /// and returns the default configuration.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// The loaded or default configuration, or an error if loading/creation failed.
    pub async fn load_from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Applies `OVERMIND_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), String> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides looked up through `lookup`.
    ///
    /// Keys are the dotted config path upper-cased with `_` separators and
    /// the `OVERMIND` prefix, e.g. `server.port` is `OVERMIND_SERVER_PORT`.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |path: &str| lookup(&format!("{ENV_PREFIX}_{path}"));

        if let Some(host) = var("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("SERVER_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| format!("Invalid {ENV_PREFIX}_SERVER_PORT: {port}"))?;
        }
        if let Some(level) = var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(key) = var("CRYPTO_SHARED_KEY") {
            self.crypto.shared_key = key;
        }
        Ok(())
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the configuration is valid, or an error string describing the issue.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.host.parse::<IpAddr>().is_err() {
            return Err(format!("Invalid server host: {}", self.server.host));
        }
        if self.server.port == u16::MAX {
            return Err(format!(
                "Server port must leave room for the TCP port: {}",
                self.server.port
            ));
        }

        if !self.transport.ws_path.starts_with('/') {
            return Err(format!(
                "WebSocket path must start with '/': {}",
                self.transport.ws_path
            ));
        }
        if self.transport.max_frame_size == 0 || self.transport.max_frame_size > usize::from(u16::MAX) {
            return Err(format!(
                "Max frame size must be between 1 and {}",
                u16::MAX
            ));
        }
        if self.transport.outbound_capacity == 0 {
            return Err("Outbound capacity must be greater than 0".to_string());
        }
        if self.transport.pong_wait_secs == 0 {
            return Err("Pong wait must be at least 1 second".to_string());
        }
        if self.transport.write_wait_secs == 0 {
            return Err("Write wait must be at least 1 second".to_string());
        }

        if !matches!(self.crypto.shared_key.len(), 16 | 24 | 32) {
            return Err(format!(
                "Shared key must be 16, 24 or 32 bytes, got {}",
                self.crypto.shared_key.len()
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!("Invalid log level: {}", self.logging.level));
        }

        Ok(())
    }

    /// Converts the application configuration to the gateway configuration.
    ///
    /// # Returns
    ///
    /// A `GatewayConfig` ready for both servers, or an error if an address
    /// or the key cannot be used.
    pub fn to_gateway_config(&self) -> Result<GatewayConfig, Box<dyn std::error::Error>> {
        let host: IpAddr = self.server.host.parse()?;
        let tcp_port = self
            .server
            .port
            .checked_add(1)
            .ok_or_else(|| format!("No TCP port after {}", self.server.port))?;

        let key = self.crypto.shared_key.as_bytes();
        if key == DEV_SHARED_KEY {
            warn!("🔑 Using the built-in development key; set crypto.shared_key for production");
        }

        let idle = self.transport.tcp_idle_timeout_secs;
        let config = GatewayConfig {
            ws_bind_address: SocketAddr::new(host, self.server.port),
            tcp_bind_address: SocketAddr::new(host, tcp_port),
            ws_path: self.transport.ws_path.clone(),
            max_frame_size: self.transport.max_frame_size,
            outbound_capacity: self.transport.outbound_capacity,
            pong_wait: Duration::from_secs(self.transport.pong_wait_secs),
            write_wait: Duration::from_secs(self.transport.write_wait_secs),
            tcp_idle_timeout: (idle > 0).then(|| Duration::from_secs(idle)),
            shared_key: CipherKey::new(key)?,
            require_handshake: self.session.require_handshake,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();

        assert_eq!(config.server.name, "overmind-server");
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.transport.ws_path, "/ws");
        assert_eq!(config.transport.max_frame_size, 4096);
        assert_eq!(config.transport.outbound_capacity, 256);
        assert_eq!(config.transport.pong_wait_secs, 60);
        assert_eq!(config.transport.tcp_idle_timeout_secs, 180);
        assert_eq!(config.crypto.shared_key.as_bytes(), DEV_SHARED_KEY);
        assert!(!config.session.require_handshake);
        assert_eq!(config.logging.level, "debug");
        assert!(!config.logging.json_format);
        assert_eq!(config.shutdown.grace_secs, 10);
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_load_from_nonexistent_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());

        let reloaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded, config);
    }

    #[tokio::test]
    async fn test_load_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let toml_content = r#"
[server]
port = 9000

[transport]
tcp_idle_timeout_secs = 0

[session]
require_handshake = true

[logging]
level = "info"
json_format = true
"#;
        tokio::fs::write(&path, toml_content).await.unwrap();

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.transport.max_frame_size, 4096);
        assert!(config.session.require_handshake);
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.json_format);
        assert_eq!(config.shutdown.grace_secs, 10);

        let gateway = config.to_gateway_config().unwrap();
        assert_eq!(gateway.tcp_idle_timeout, None);
        assert!(gateway.require_handshake);
    }

    #[tokio::test]
    async fn test_load_rejects_broken_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        tokio::fs::write(&path, "[server\nport = ").await.unwrap();
        assert!(AppConfig::load_from_file(&path).await.is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_overrides_from(env(&[
                ("OVERMIND_SERVER_PORT", "7000"),
                ("OVERMIND_SERVER_HOST", "127.0.0.1"),
                ("OVERMIND_LOG_LEVEL", "warn"),
                ("OVERMIND_CRYPTO_SHARED_KEY", "0123456789abcdef0123456789abcdef"),
            ]))
            .unwrap();

        assert_eq!(config.server.port, 7000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.crypto.shared_key.len(), 32);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_override_with_bad_port() {
        let mut config = AppConfig::default();
        let result = config.apply_overrides_from(env(&[("OVERMIND_SERVER_PORT", "eighty")]));
        assert!(result.is_err());
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_validation_failures() {
        let mut config = AppConfig::default();
        config.server.host = "not-an-ip".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.server.port = u16::MAX;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.transport.ws_path = "ws".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.transport.max_frame_size = 70_000;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.transport.outbound_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.crypto.shared_key = "short".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_to_gateway_config_conversion() {
        let mut config = AppConfig::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 9100;

        let gateway = config.to_gateway_config().unwrap();
        assert_eq!(gateway.ws_bind_address, "127.0.0.1:9100".parse().unwrap());
        assert_eq!(gateway.tcp_bind_address, "127.0.0.1:9101".parse().unwrap());
        assert_eq!(gateway.ws_path, "/ws");
        assert_eq!(gateway.pong_wait, Duration::from_secs(60));
        assert_eq!(gateway.ping_period(), Duration::from_secs(54));
        assert_eq!(gateway.write_wait, Duration::from_secs(10));
        assert_eq!(gateway.tcp_idle_timeout, Some(Duration::from_secs(180)));
        assert_eq!(gateway.shared_key.size(), 16);
    }

    #[test]
    fn test_shared_key_is_redacted() {
        let rendered = format!("{:?}", AppConfig::default().crypto);
        assert!(!rendered.contains("EDb35olv1SRQG5NT"));
    }
}

//! # Overmind Server - Main Entry Point
//!
//! Runs the edge gateway (WebSocket and raw TCP) in front of the portal and
//! world actors. This crate handles CLI parsing, configuration loading,
//! logging setup and the process lifecycle.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with default configuration (creates config.toml if missing)
//! overmind
//!
//! # Specify custom configuration
//! overmind --config production.toml
//!
//! # Override specific settings
//! overmind --port 9000 --log-level info
//!
//! # JSON logging for production
//! overmind --json-logs
//! ```
//!
//! ## Configuration
//!
//! Settings come from the TOML file, then `OVERMIND_*` environment
//! variables, then command-line flags.
//!
//! ## Signal Handling
//!
//! SIGINT or SIGTERM starts a graceful shutdown; a second signal exits
//! immediately.

use tracing::error;

pub mod app;
pub mod cli;
pub mod config;
pub mod lifecycle;
pub mod logging;
pub mod signals;

use app::Application;
use cli::CliArgs;
use config::AppConfig;

/// Parses arguments, resolves configuration, sets up logging and runs the
/// server until it is signalled to stop.
///
/// # Exit Codes
///
/// * **0**: Successful execution and shutdown
/// * **1**: Error during startup, configuration, or runtime
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let config = match resolve_config(&args).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = logging::setup_logging(&config.logging, args.json_logs) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }

    match Application::new(config) {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("❌ Failed to start application: {e}");
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Loads the config file and layers environment and CLI overrides on top.
pub async fn resolve_config(args: &CliArgs) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let mut config = AppConfig::load_from_file(&args.config_path).await?;
    config.apply_env_overrides()?;
    args.apply_overrides(&mut config);
    Ok(config)
}

pub use config::{CryptoSettings, LoggingSettings, ServerSettings, SessionSettings, ShutdownSettings, TransportSettings};

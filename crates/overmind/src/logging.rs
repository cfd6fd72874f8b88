//! Logging system setup and the startup banner.
//!
//! Installs the global `tracing` subscriber. Components never touch the
//! subscriber directly; they receive an [`overmind_kit::Logger`] built on
//! top of it.

use crate::config::LoggingSettings;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes the logging system with the specified configuration.
///
/// `RUST_LOG`, when set, wins over the configured level.
///
/// # Arguments
///
/// * `config` - Logging configuration after all overrides
/// * `json_format` - Whether to force JSON output format (CLI override)
///
/// # Returns
///
/// `Ok(())` if logging was set up successfully, or an error if a subscriber
/// was already installed.
pub fn setup_logging(
    config: &LoggingSettings,
    json_format: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let log_level = config.level.as_str();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if json_format || config.json_format {
        registry
            .with(fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_file(false)
                .with_line_number(false)
                .with_thread_ids(true)
                .with_thread_names(true)
            )
            .try_init()?;
    } else {
        registry
            .with(fmt::layer()
                .with_ansi(true)
                .with_file(false)
                .with_line_number(false)
                .with_thread_ids(true)
                .with_thread_names(true)
            )
            .try_init()?;
    }

    info!("🔧 Logging initialized with level: {}", log_level);
    Ok(())
}

/// Displays the startup banner through the logger.
pub fn display_banner() {
    let version = option_env!("CARGO_PKG_VERSION").unwrap_or("UNK");
    info!("╔══════════════════════════════════════════╗");
    info!("║            🧠 OVERMIND SERVER 🧠         ║");
    info!("║              Edge Gateway v{}         ║", version);
    info!("║                                          ║");
    info!("║  🔐 AES + CRC16 Wire Protocol            ║");
    info!("║  🎭 Actor-Backed Sessions                ║");
    info!("║  🌐 WebSocket + TCP Support              ║");
    info!("║                                          ║");
    info!("╚══════════════════════════════════════════╝");
}

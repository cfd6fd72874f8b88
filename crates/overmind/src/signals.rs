//! Signal handling for graceful server shutdown.
//!
//! The first SIGINT or SIGTERM (Ctrl+C on Windows) starts a graceful
//! shutdown. The application listens again afterwards so that a second
//! signal can end the process immediately.

use tokio::signal;
use tracing::info;

/// Waits for a termination signal and logs it.
///
/// # Returns
///
/// `Ok(())` once a signal arrived, or an error if the handlers could not be
/// installed.
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    wait_for_shutdown_signal_silent().await?;
    info!("📡 Received shutdown signal - initiating graceful shutdown");
    Ok(())
}

/// Same as [`wait_for_shutdown_signal`] without logging.
pub async fn wait_for_shutdown_signal_silent() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => (),
            _ = sigterm.recv() => ()
        }
    }

    #[cfg(windows)]
    signal::ctrl_c().await?;

    Ok(())
}

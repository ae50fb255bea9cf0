//! Signal handling so a paced replay can be stopped early.

use tokio::signal;
use tracing::{info, warn};

/// Waits for a termination signal (SIGINT or SIGTERM on Unix, Ctrl+C on
/// Windows).
pub async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => {
                info!("📡 Received SIGINT");
            }
            _ = sigterm.recv() => {
                info!("📡 Received SIGTERM");
            }
        }
    }

    #[cfg(windows)]
    {
        signal::ctrl_c().await?;
        info!("📡 Received Ctrl+C");
    }

    Ok(())
}

/// Resolves on a termination signal; never resolves if handlers could not
/// be installed.
pub async fn until_shutdown() {
    if let Err(e) = shutdown_signal().await {
        warn!("Signal handlers unavailable: {}", e);
        std::future::pending::<()>().await;
    }
}

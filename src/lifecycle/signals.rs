//! Stop signals for a serving loop.
//!
//! # Responsibilities
//! - Wait for Ctrl+C (SIGINT)
//! - Wait for an explicit `stop()` through the shutdown channel
//! - Resolve on whichever comes first

use tokio::sync::broadcast;

/// Resolves when Ctrl+C is received or the shutdown channel fires.
pub async fn stop_signal(mut stop: broadcast::Receiver<()>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("Shutdown signal received"),
        _ = stop.recv() => tracing::info!("Stop requested"),
    }
}

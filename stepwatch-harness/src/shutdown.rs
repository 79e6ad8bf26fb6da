//! Signal handling: SIGINT / SIGTERM cancel pending waits.

use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::{Notify, watch};

/// Creates a future that completes when a termination signal is received.
///
/// Listens for SIGTERM and SIGINT (Ctrl+C).
pub async fn shutdown_signal() -> std::io::Result<()> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM, cancelling pending waits");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT, cancelling pending waits");
        }
    }
    Ok(())
}

/// Spawns a task that sets `cancel_tx` to `true` on the first signal.
///
/// Returns a Notify that stops the task once the run is complete.
pub fn spawn_cancel_on_signal(cancel_tx: watch::Sender<bool>) -> Arc<Notify> {
    let done = Arc::new(Notify::new());
    let done_clone = done.clone();

    tokio::spawn(async move {
        tokio::select! {
            result = shutdown_signal() => match result {
                Ok(()) => {
                    cancel_tx.send_replace(true);
                }
                Err(e) => {
                    tracing::error!("Failed to install signal handlers: {}", e);
                }
            },
            _ = done_clone.notified() => {
                tracing::debug!("Signal handler shutting down");
            }
        }
    });

    done
}

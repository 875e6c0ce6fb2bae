//! Signal handling for graceful, per-partition shutdown.
//!
//! Signals never terminate the process directly. They set the shared
//! [`CancellationToken`], which the orchestrator checks at stage boundaries
//! and at the commit point.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Waits for the next SIGINT or SIGTERM.
#[cfg(unix)]
async fn next_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => Ok("SIGINT"),
        _ = sigterm.recv() => Ok("SIGTERM"),
    }
}

/// Waits for the next Ctrl-C.
#[cfg(not(unix))]
async fn next_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl-C")
}

/// Spawns a task that cancels `token` on the first interrupt or terminate
/// signal. Further signals are logged and otherwise ignored; the in-flight
/// stage always finishes and its partition is rolled back.
#[must_use]
pub fn install_signal_handlers(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let name = match next_signal().await {
                Ok(name) => name,
                Err(e) => {
                    log::error!("Failed to install signal handlers: {e}");
                    return;
                }
            };

            if token.is_cancelled() {
                log::warn!(
                    "{name} received again; still waiting for the current stage to finish"
                );
            } else {
                log::warn!(
                    "{name} received; finishing the current stage, then rolling back the in-flight year"
                );
                token.cancel();
            }
        }
    })
}

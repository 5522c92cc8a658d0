//! OS signal handling.
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - The listener task ends after the first signal

use tokio::task::JoinHandle;

use super::Shutdown;

/// Spawn a task that triggers `shutdown` on Ctrl-C.
///
/// The task also ends, without triggering, once `shutdown` fires for any
/// other reason.
pub fn listen_for_ctrl_c(shutdown: Shutdown) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => {
                    tracing::warn!("Shutdown signal received, cancelling in-flight calls");
                    shutdown.trigger();
                }
                Err(error) => tracing::error!(%error, "Failed to install Ctrl+C handler"),
            },
            _ = shutdown.triggered() => {}
        }
    })
}

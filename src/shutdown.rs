//! Shutdown signal handling.
//!
//! Installs the OS signal handlers and trips the shared cancellation token
//! when the process is asked to stop. The token is the only channel
//! between this task and the session: every transport call and every retry
//! sleep races it, so a single `cancel()` unblocks whatever the client is
//! doing at that moment.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Spawn the signal listener task.
///
/// The returned handle resolves once a signal has arrived and the token
/// has been tripped; callers normally never join it.
pub fn spawn_signal_listener(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let signal = wait_for_signal().await;
        info!(action = "shutdown", result = "success", signal);
        cancel.cancel();
    })
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    // Compose sends SIGTERM on `docker compose down`; Ctrl-C covers
    // interactive runs.
    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(err) => {
            warn!(action = "shutdown", result = "fail", error = %err);
            let _ = tokio::signal::ctrl_c().await;
            return "SIGINT";
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => "SIGINT",
        _ = term.recv() => "SIGTERM",
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "SIGINT"
}

// Signal handling module
//
// SIGTERM and SIGINT (Ctrl+C) request a graceful shutdown.

use std::sync::Arc;
use tokio::sync::Notify;

use crate::logger;

/// Spawn a task that notifies `shutdown` on the first SIGTERM or SIGINT.
///
/// `notify_one` stores a permit, so a signal arriving while the accept
/// loop is busy is not lost.
#[cfg(unix)]
pub fn start_signal_handler(shutdown: Arc<Notify>) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::spawn(async move {
        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        logger::log_info(&format!("[Signal] {name} received, shutting down"));
        shutdown.notify_one();
    });
    Ok(())
}

/// Non-Unix fallback: only Ctrl+C is handled
#[cfg(not(unix))]
pub fn start_signal_handler(shutdown: Arc<Notify>) -> std::io::Result<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            logger::log_info("[Signal] Ctrl+C received, shutting down");
            shutdown.notify_one();
        }
    });
    Ok(())
}

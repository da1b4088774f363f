//! Process signal handling.
//!
//! The signal task never touches the server directly; it only flips the
//! shutdown flag through a [`ShutdownHandle`].

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::lifecycle::ShutdownHandle;

/// Wait for Ctrl-C (any platform) or SIGTERM (Unix). Returns the signal name.
pub async fn wait_for_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => "SIGINT",
        () = terminate => "SIGTERM",
    }
}

/// Spawn a task that requests shutdown on the first termination signal.
///
/// The task also ends quietly if shutdown is requested some other way.
pub fn spawn_signal_listener(handle: ShutdownHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            signal = wait_for_signal() => {
                info!(signal, "Received termination signal");
                handle.shutdown();
            }
            () = handle.requested() => {}
        }
    })
}

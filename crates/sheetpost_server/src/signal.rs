//! Process termination signals.

use tracing::{info, warn};

/// Wait for Ctrl-C, or on Unix also SIGTERM or SIGHUP.
///
/// Returns the name of the signal received.
pub async fn wait_for_termination() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::hangup()),
        ) {
            (Ok(mut term), Ok(mut hup)) => {
                let name = tokio::select! {
                    _ = ctrl_c() => "SIGINT",
                    _ = term.recv() => "SIGTERM",
                    _ = hup.recv() => "SIGHUP",
                };
                info!(signal = name, "Received termination signal");
                return name;
            }
            (term, hup) => {
                warn!(
                    sigterm_ok = term.is_ok(),
                    sighup_ok = hup.is_ok(),
                    "Could not install Unix signal handlers, listening for Ctrl-C only"
                );
            }
        }
    }

    ctrl_c().await;
    info!(signal = "SIGINT", "Received termination signal");
    "SIGINT"
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Ctrl-C handler failed");
        std::future::pending::<()>().await;
    }
}

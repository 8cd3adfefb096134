use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Wait for SIGINT or SIGTERM, then cancel `token`.
pub async fn wait_for_shutdown_signal(token: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {
                        info!(event = "cli.watch.signal_received", signal = "SIGINT");
                    }
                    _ = sigterm.recv() => {
                        info!(event = "cli.watch.signal_received", signal = "SIGTERM");
                    }
                }
            }
            Err(e) => {
                warn!(event = "cli.watch.sigterm_unavailable", error = %e);
                ctrl_c.await.ok();
                info!(event = "cli.watch.signal_received", signal = "SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!(event = "cli.watch.signal_received", signal = "SIGINT");
    }

    token.cancel();
}

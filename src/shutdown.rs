//! Shutdown signal handling.
//!
//! The first Ctrl+C or SIGTERM cancels the scheduler, which finishes the
//! entry in progress. A second one means the operator does not want to wait.

use std::future::Future;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::logging::LogHandle;

/// Exit status for a forced quit (128 + SIGINT).
pub const FORCED_EXIT_CODE: i32 = 130;

/// Wait for Ctrl+C or, on Unix, SIGTERM. Returns a name for the signal.
pub async fn next_signal(log: LogHandle) -> &'static str {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            log.in_scope(|| warn!("Cannot listen for Ctrl+C: {err}"));
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                log.in_scope(|| warn!("Cannot listen for SIGTERM: {err}"));
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => "interrupt",
        () = terminate => "terminate signal",
    }
}

/// Cancel `token` on the first signal, then return on the second.
///
/// The caller decides what a second signal means; the binary exits with
/// `FORCED_EXIT_CODE`.
pub async fn escalate<S, Fut>(mut signals: S, token: CancellationToken, log: LogHandle) -> &'static str
where
    S: FnMut() -> Fut,
    Fut: Future<Output = &'static str>,
{
    let received = signals().await;
    log.in_scope(|| info!("Received {received}, finishing the current operation before exiting (repeat to force quit)"));
    token.cancel();

    let again = signals().await;
    log.in_scope(|| warn!("Received {again} again, exiting without waiting"));
    again
}

//! Graceful shutdown handling.

use tokio_util::sync::CancellationToken;

/// Shuts down all background tasks gracefully.
///
/// Signals the progress logging task to stop and awaits it. Collection state
/// is checkpointed by the collector itself, so no flush is needed here.
pub async fn shutdown_gracefully(
    cancel: CancellationToken,
    logging_task: Option<tokio::task::JoinHandle<()>>,
) {
    // Signal logging task to stop and await it
    cancel.cancel();
    if let Some(logging_task) = logging_task {
        let _ = logging_task.await;
    }
}

//! Unique-fetch pass: each deduplicated resource ID is fetched exactly once.
//!
//! Fetches run on a bounded set of spawned workers. The spawn loop is the
//! single checkpoint writer; worker tasks record their own outcomes into the
//! shared cache and ledger. A dead credential or an open circuit cancels the
//! pass so remaining workers exit without touching the network.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, error, info, warn};
use serde_json::Value;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::client::{ReferenceLister, ResourceFetcher};
use crate::config::PHASE2_PROGRESS_EVERY;
use crate::error_handling::{CollectorError, ErrorKind, ErrorLedger};

use super::payload;
use super::types::IncompleteResource;
use super::{DedupCollector, RunState};

/// All parameters needed to fetch one resource.
pub(super) struct FetchTaskParams<F> {
    /// Resource to fetch.
    pub resource_id: String,
    /// Semaphore permit (dropped when the task completes).
    pub permit: OwnedSemaphorePermit,
    /// Fetch capability.
    pub fetcher: Arc<F>,
    /// Shared failure ledger.
    pub ledger: Arc<ErrorLedger>,
    /// Shared payload cache.
    pub cache: Arc<Mutex<BTreeMap<String, Value>>>,
    /// Shared list of payloads flagged as incomplete.
    pub incomplete: Arc<Mutex<Vec<IncompleteResource>>>,
    /// Resources fetched so far this run.
    pub fetched: Arc<AtomicUsize>,
    /// Resources that ended in a recorded failure.
    pub failed: Arc<AtomicUsize>,
    /// Size of this pass, for progress lines.
    pub total: usize,
    /// Cancelled by a worker that hit a run-ending condition.
    pub abort: CancellationToken,
    /// Cancelled by an external interrupt.
    pub shutdown: CancellationToken,
}

/// What the drain loop needs to know about one finished task.
pub(super) enum TaskVerdict {
    /// The fetch ran and its outcome was recorded.
    Completed,
    /// The task exited early because the pass was already cancelled.
    Skipped,
    /// A run-ending condition; the pass stops once in-flight tasks drain.
    Fatal(CollectorError),
}

/// Fetch one resource and record the outcome.
pub(super) async fn fetch_resource_task<F>(params: FetchTaskParams<F>) -> TaskVerdict
where
    F: ResourceFetcher + 'static,
{
    let FetchTaskParams {
        resource_id,
        permit: _permit, // Hold permit until task completes
        fetcher,
        ledger,
        cache,
        incomplete,
        fetched,
        failed,
        total,
        abort,
        shutdown,
    } = params;

    if abort.is_cancelled() || shutdown.is_cancelled() {
        return TaskVerdict::Skipped;
    }

    match fetcher.fetch_resource(&resource_id).await {
        Ok(mut body) => {
            if let Some(flagged) = payload::flag_incomplete(&resource_id, &mut body) {
                incomplete
                    .lock()
                    .expect("incomplete list lock poisoned")
                    .push(flagged);
            }
            payload::annotate(&resource_id, &mut body);
            cache
                .lock()
                .expect("resource cache lock poisoned")
                .insert(resource_id, body);

            let done = fetched.fetch_add(1, Ordering::SeqCst) + 1;
            if done % PHASE2_PROGRESS_EVERY == 0 {
                info!("Fetched resource details: {done}/{total}");
            }
            TaskVerdict::Completed
        }
        Err(e) => {
            if let Some(fatal) = e.as_fatal() {
                error!("Aborting fetch pass at resource {resource_id}: {e}");
                abort.cancel();
                return TaskVerdict::Fatal(fatal);
            }

            let kind = e.kind().unwrap_or(ErrorKind::Other);
            if kind == ErrorKind::Other {
                ledger.record_resource_with_detail(kind, &resource_id, &e.to_string());
            } else {
                ledger.record_resource(kind, &resource_id);
            }
            failed.fetch_add(1, Ordering::SeqCst);
            debug!("Failed to fetch resource {resource_id}: {e}");
            TaskVerdict::Completed
        }
    }
}

impl<L, F> DedupCollector<L, F>
where
    L: ReferenceLister,
    F: ResourceFetcher + 'static,
{
    /// Fetch every resource in `work` through the bounded worker pool.
    ///
    /// Returns `Err` only for run-ending conditions; per-resource failures
    /// land in the ledger and the pass keeps going. The caller persists a
    /// checkpoint before surfacing any error from here.
    pub(super) async fn fetch_unique(
        &self,
        state: &RunState,
        work: Vec<String>,
    ) -> Result<(), CollectorError> {
        if work.is_empty() {
            info!("All unique resources already cached; nothing to fetch");
            return Ok(());
        }

        let total = work.len();
        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrency));
        let abort = CancellationToken::new();
        let mut tasks = FuturesUnordered::new();
        let mut fatal: Option<CollectorError> = None;
        let mut spawned = 0usize;

        for resource_id in work {
            if self.shutdown.is_cancelled() {
                warn!("Collection interrupted; stopping fetch pass");
                fatal = Some(CollectorError::Interrupted);
                break;
            }
            if abort.is_cancelled() {
                break;
            }

            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    warn!("Semaphore closed, skipping resource: {resource_id}");
                    continue;
                }
            };

            tasks.push(tokio::spawn(fetch_resource_task(FetchTaskParams {
                resource_id,
                permit,
                fetcher: Arc::clone(&self.fetcher),
                ledger: Arc::clone(&self.ledger),
                cache: Arc::clone(&state.cache),
                incomplete: Arc::clone(&state.incomplete),
                fetched: Arc::clone(&state.fetched),
                failed: Arc::clone(&state.failed),
                total,
                abort: abort.clone(),
                shutdown: self.shutdown.clone(),
            })));
            spawned += 1;

            // The spawn loop is throttled by the semaphore, so spawn count
            // tracks completions to within the worker-pool size.
            if spawned % self.options.checkpoint_interval == 0 {
                info!("Saving checkpoint to {}...", self.store.path().display());
                if let Err(e) = self.save_snapshot(state).await {
                    error!("Failed to save checkpoint: {e}");
                }
            }
        }

        while let Some(task_result) = tasks.next().await {
            match task_result {
                Ok(TaskVerdict::Completed | TaskVerdict::Skipped) => {}
                Ok(TaskVerdict::Fatal(err)) => {
                    if fatal.is_none() {
                        fatal = Some(err);
                    }
                }
                Err(join_error) => {
                    state.failed.fetch_add(1, Ordering::SeqCst);
                    warn!("Fetch task panicked: {join_error:?}");
                }
            }
        }

        let fetched = state.fetched.load(Ordering::SeqCst);
        let failed = state.failed.load(Ordering::SeqCst);
        if failed > 0 {
            info!(
                "Failed to fetch details for {failed}/{total} resources ({:.1}%)",
                100.0 * failed as f64 / total as f64
            );
        }

        if let Some(err) = fatal {
            return Err(err);
        }

        info!("Fetch pass complete: {fetched} resources fetched");
        Ok(())
    }
}

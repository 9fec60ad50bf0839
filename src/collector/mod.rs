//! Deduplicating collection engine.
//!
//! Given a set of owners, the collector gathers each owner's resource
//! references, fetches every distinct reference exactly once through the
//! injected fetch capability, and re-associates cached payloads back to
//! every owner that referenced them. Failures are tracked per error kind
//! with the affected IDs, resources that failed with a transient kind get
//! one automatic retry pass, and progress is checkpointed so an interrupted
//! run resumes instead of starting over.

mod associate;
mod fetch;
mod payload;
mod references;
mod types;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use log::{debug, error, info};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::checkpoint::{CheckpointSnapshot, CheckpointStore};
use crate::client::{ReferenceLister, ResourceFetcher, TimeWindow};
use crate::config::{CHECKPOINT_INTERVAL, DEFAULT_MAX_CONCURRENCY, DEFAULT_PAGE_SIZE};
use crate::error_handling::{CollectorError, ErrorLedger};

use associate::associate;

pub use types::{CollectionResult, CollectionStats, IncompleteResource, OwnerRecord};

/// Tunables for one collection run.
#[derive(Debug, Clone)]
pub struct CollectorOptions {
    /// Reference-listing page size; a shorter page ends an owner's history.
    pub page_size: usize,
    /// Optional server-side time filter forwarded to reference listings.
    pub time_window: Option<TimeWindow>,
    /// Fetches between periodic checkpoint saves.
    pub checkpoint_interval: usize,
    /// Concurrent workers during the unique-fetch pass.
    pub max_concurrency: usize,
}

impl Default for CollectorOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            time_window: None,
            checkpoint_interval: CHECKPOINT_INTERVAL,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// Mutable state shared by the phases of one run.
#[derive(Default)]
pub(crate) struct RunState {
    /// Fetched payloads keyed by resource ID. Shared with fetch workers.
    cache: Arc<Mutex<BTreeMap<String, Value>>>,
    /// Per-owner reference lists, in listing order.
    owner_references: BTreeMap<String, Vec<String>>,
    /// Owners whose listing came back empty.
    owners_with_no_references: Vec<String>,
    /// Whether reference gathering finished (possibly in a prior run).
    references_complete: bool,
    /// Resources fetched over the network this run.
    fetched: Arc<AtomicUsize>,
    /// Resources whose fetch ended in a recorded failure.
    failed: Arc<AtomicUsize>,
    /// Payloads flagged as incomplete during fetch.
    incomplete: Arc<Mutex<Vec<IncompleteResource>>>,
}

impl RunState {
    fn restore(snapshot: CheckpointSnapshot) -> Self {
        let mut state = Self::default();
        *state.cache.lock().expect("resource cache lock poisoned") = snapshot.resources;
        if snapshot.references_complete {
            state.owner_references = snapshot.owner_references;
            state.owners_with_no_references = snapshot.owners_with_no_references;
            state.references_complete = true;
        }
        state
    }

    fn snapshot(&self) -> CheckpointSnapshot {
        CheckpointSnapshot {
            resources: self
                .cache
                .lock()
                .expect("resource cache lock poisoned")
                .clone(),
            owner_references: self.owner_references.clone(),
            owners_with_no_references: self.owners_with_no_references.clone(),
            references_complete: self.references_complete,
        }
    }

    /// Distinct resource IDs across every owner's references, sorted.
    fn unique_ids(&self) -> Vec<String> {
        let mut ids = BTreeSet::new();
        for references in self.owner_references.values() {
            ids.extend(references.iter().cloned());
        }
        ids.into_iter().collect()
    }
}

/// Orchestrates reference gathering, deduplicated fetching, and owner
/// association over injected listing and fetch capabilities.
pub struct DedupCollector<L, F> {
    lister: Arc<L>,
    fetcher: Arc<F>,
    ledger: Arc<ErrorLedger>,
    store: CheckpointStore,
    options: CollectorOptions,
    shutdown: CancellationToken,
}

impl<L, F> DedupCollector<L, F>
where
    L: ReferenceLister,
    F: ResourceFetcher + 'static,
{
    /// Create a collector over the given capabilities and checkpoint store.
    pub fn new(
        lister: Arc<L>,
        fetcher: Arc<F>,
        store: CheckpointStore,
        mut options: CollectorOptions,
    ) -> Self {
        options.checkpoint_interval = options.checkpoint_interval.max(1);
        Self {
            lister,
            fetcher,
            ledger: Arc::new(ErrorLedger::new()),
            store,
            options,
            shutdown: CancellationToken::new(),
        }
    }

    /// Use an externally controlled token for graceful interruption.
    ///
    /// When the token is cancelled the run stops at the next safe point,
    /// saves a final checkpoint, and returns [`CollectorError::Interrupted`].
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Shared failure ledger for this collector.
    ///
    /// Clone before [`run`](Self::run) to inspect recorded failures even when
    /// the run ends early.
    pub fn error_ledger(&self) -> Arc<ErrorLedger> {
        Arc::clone(&self.ledger)
    }

    /// Run the full collection for `owners`.
    ///
    /// Per-resource failures never fail the run; they are reported in the
    /// result's error summary. The returned `Err` cases are the run-ending
    /// conditions (dead credential, open circuit, interrupt), each of which
    /// leaves a checkpoint behind for a later resume. On full success the
    /// checkpoint is removed.
    pub async fn run(self, owners: &[String]) -> Result<CollectionResult, CollectorError> {
        let started = Instant::now();
        info!("Starting collection for {} owners", owners.len());

        let mut state = match self.store.load().await {
            Some(snapshot) => RunState::restore(snapshot),
            None => RunState::default(),
        };

        if state.references_complete {
            info!(
                "Reference gathering already complete: {} owners restored from checkpoint",
                state.owner_references.len()
            );
        } else {
            if let Err(fatal) = self.gather_references(&mut state, owners).await {
                self.save_snapshot_best_effort(&state).await;
                return Err(fatal);
            }
            state.references_complete = true;
        }

        let unique_ids = state.unique_ids();
        let total_references: usize = state.owner_references.values().map(Vec::len).sum();
        let api_calls_saved = total_references - unique_ids.len();
        info!(
            "{} unique resources identified from {} total references",
            unique_ids.len(),
            total_references
        );
        if total_references > 0 {
            info!(
                "Deduplication efficiency: {:.1}% ({} API calls saved)",
                100.0 * api_calls_saved as f64 / total_references as f64,
                api_calls_saved
            );
        }

        let work: Vec<String> = {
            let cache = state.cache.lock().expect("resource cache lock poisoned");
            unique_ids
                .iter()
                .filter(|id| !cache.contains_key(*id))
                .cloned()
                .collect()
        };
        let cache_hits = unique_ids.len() - work.len();
        if cache_hits > 0 {
            info!("{cache_hits} resources already cached from a previous run");
        }
        info!("Fetching details for {} unique resources...", work.len());

        if let Err(fatal) = self.fetch_unique(&state, work).await {
            self.save_snapshot_best_effort(&state).await;
            return Err(fatal);
        }

        info!("Building owner associations...");
        let mut owner_records = {
            let cache = state.cache.lock().expect("resource cache lock poisoned");
            associate(&state.owner_references, &cache)
        };

        let recovered = self.retry_failed(&state).await;
        if recovered > 0 {
            debug!("Refreshing owner associations with {recovered} recovered resources");
            let cache = state.cache.lock().expect("resource cache lock poisoned");
            owner_records = associate(&state.owner_references, &cache);
        }

        let resources = state
            .cache
            .lock()
            .expect("resource cache lock poisoned")
            .clone();
        let stats = CollectionStats {
            owners_processed: owners.len(),
            total_references,
            unique_resources: unique_ids.len(),
            resources_fetched: state.fetched.load(Ordering::SeqCst) + recovered,
            cache_hits,
            api_calls_saved,
            recovered_on_retry: recovered,
            owners_with_no_references: state.owners_with_no_references.clone(),
            incomplete_resources: state
                .incomplete
                .lock()
                .expect("incomplete list lock poisoned")
                .clone(),
            collection_time_seconds: started.elapsed().as_secs_f64(),
        };
        let errors = self.ledger.report();

        self.store.delete().await;

        info!(
            "Collection completed: {} resources fetched, {} API calls saved, {:.2}s",
            stats.resources_fetched, stats.api_calls_saved, stats.collection_time_seconds
        );

        Ok(CollectionResult {
            owners: owner_records,
            resources,
            stats,
            errors,
        })
    }

    pub(crate) async fn save_snapshot(&self, state: &RunState) -> Result<(), CollectorError> {
        self.store.save(&state.snapshot()).await
    }

    async fn save_snapshot_best_effort(&self, state: &RunState) {
        if let Err(e) = self.save_snapshot(state).await {
            error!("Failed to save checkpoint: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handling::{ErrorKind, FetchError};
    use serde_json::json;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn status_error(kind: ErrorKind) -> FetchError {
        let status = match kind {
            ErrorKind::RateLimited => 429,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Validation => 400,
            _ => 500,
        };
        FetchError::Status {
            kind,
            status,
            suggested_delay: None,
        }
    }

    fn full_lobby() -> Value {
        json!({
            "info": {
                "gameVersion": "Version 15.4",
                "queueId": 1100,
                "participants": (0..8).map(|i| json!({"placement": i + 1})).collect::<Vec<_>>(),
            }
        })
    }

    #[derive(Default)]
    struct StaticLister {
        references: HashMap<String, Vec<String>>,
        fail_owners: HashMap<String, ErrorKind>,
        calls: Mutex<Vec<(String, usize)>>,
    }

    impl StaticLister {
        fn with(references: &[(&str, &[&str])]) -> Self {
            Self {
                references: references
                    .iter()
                    .map(|(owner, ids)| {
                        (
                            owner.to_string(),
                            ids.iter().map(|id| id.to_string()).collect(),
                        )
                    })
                    .collect(),
                ..Self::default()
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl ReferenceLister for StaticLister {
        async fn list_references(
            &self,
            owner_id: &str,
            start: usize,
            count: usize,
            _window: Option<&TimeWindow>,
        ) -> Result<Vec<String>, FetchError> {
            self.calls.lock().unwrap().push((owner_id.to_string(), start));
            if let Some(kind) = self.fail_owners.get(owner_id) {
                return Err(status_error(*kind));
            }
            let references = self.references.get(owner_id).cloned().unwrap_or_default();
            Ok(references.into_iter().skip(start).take(count).collect())
        }
    }

    #[derive(Default)]
    struct ScriptedFetcher {
        /// Failures served before a resource starts succeeding.
        failures: Mutex<HashMap<String, (usize, ErrorKind)>>,
        /// When set, every call is rejected as circuit-open.
        circuit_open: bool,
        calls: Mutex<HashMap<String, usize>>,
        successes: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn fail_n(self, resource_id: &str, failures: usize, kind: ErrorKind) -> Self {
            self.failures
                .lock()
                .unwrap()
                .insert(resource_id.to_string(), (failures, kind));
            self
        }

        fn always_fail(self, resource_id: &str, kind: ErrorKind) -> Self {
            self.fail_n(resource_id, usize::MAX, kind)
        }

        fn calls_for(&self, resource_id: &str) -> usize {
            self.calls.lock().unwrap().get(resource_id).copied().unwrap_or(0)
        }

        fn success_count(&self) -> usize {
            self.successes.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl ResourceFetcher for ScriptedFetcher {
        async fn fetch_resource(&self, resource_id: &str) -> Result<Value, FetchError> {
            *self
                .calls
                .lock()
                .unwrap()
                .entry(resource_id.to_string())
                .or_insert(0) += 1;

            if self.circuit_open {
                return Err(FetchError::CircuitOpen);
            }
            if let Some((remaining, kind)) =
                self.failures.lock().unwrap().get_mut(resource_id)
            {
                if *remaining > 0 {
                    *remaining = remaining.saturating_sub(1);
                    return Err(status_error(*kind));
                }
            }
            self.successes.fetch_add(1, Ordering::SeqCst);
            Ok(full_lobby())
        }
    }

    fn overlapping_owners() -> StaticLister {
        StaticLister::with(&[("A", &["m1", "m2"]), ("B", &["m2", "m3"])])
    }

    fn owner_names() -> Vec<String> {
        vec!["A".to_string(), "B".to_string()]
    }

    fn collector_in(
        dir: &TempDir,
        lister: Arc<StaticLister>,
        fetcher: Arc<ScriptedFetcher>,
        options: CollectorOptions,
    ) -> DedupCollector<StaticLister, ScriptedFetcher> {
        let store = CheckpointStore::new(dir.path().join("checkpoint.json"));
        DedupCollector::new(lister, fetcher, store, options)
    }

    #[tokio::test]
    async fn overlapping_references_are_fetched_once() {
        let dir = TempDir::new().unwrap();
        let lister = Arc::new(overlapping_owners());
        let fetcher = Arc::new(ScriptedFetcher::default());
        let collector = collector_in(
            &dir,
            Arc::clone(&lister),
            Arc::clone(&fetcher),
            CollectorOptions::default(),
        );

        let result = collector.run(&owner_names()).await.unwrap();

        for id in ["m1", "m2", "m3"] {
            assert_eq!(fetcher.calls_for(id), 1, "{id} should be fetched exactly once");
        }
        assert_eq!(result.stats.total_references, 4);
        assert_eq!(result.stats.unique_resources, 3);
        assert_eq!(result.stats.api_calls_saved, 1);
        assert_eq!(result.owners["A"].resource_ids, vec!["m1", "m2"]);
        assert_eq!(result.owners["B"].resource_ids, vec!["m2", "m3"]);
        assert_eq!(result.errors.total_errors, 0);
        assert!(!dir.path().join("checkpoint.json").exists());
    }

    #[tokio::test]
    async fn transient_failure_recovers_on_retry_pass() {
        let dir = TempDir::new().unwrap();
        let lister = Arc::new(overlapping_owners());
        let fetcher =
            Arc::new(ScriptedFetcher::default().fail_n("m2", 1, ErrorKind::ServerError));
        let collector = collector_in(
            &dir,
            Arc::clone(&lister),
            Arc::clone(&fetcher),
            CollectorOptions::default(),
        );

        let result = collector.run(&owner_names()).await.unwrap();

        assert_eq!(fetcher.calls_for("m2"), 2);
        assert_eq!(fetcher.success_count(), 3);
        assert_eq!(result.stats.recovered_on_retry, 1);
        assert_eq!(result.stats.resources_fetched, 3);
        assert_eq!(result.owners["A"].resource_ids, vec!["m1", "m2"]);
        assert_eq!(result.owners["B"].resource_ids, vec!["m2", "m3"]);
        assert_eq!(result.errors.total_errors, 0);
        assert_eq!(result.resources.len(), 3);
    }

    #[tokio::test]
    async fn terminal_failure_is_not_retried() {
        let dir = TempDir::new().unwrap();
        let lister = Arc::new(overlapping_owners());
        let fetcher =
            Arc::new(ScriptedFetcher::default().always_fail("m2", ErrorKind::NotFound));
        let collector = collector_in(
            &dir,
            Arc::clone(&lister),
            Arc::clone(&fetcher),
            CollectorOptions::default(),
        );

        let result = collector.run(&owner_names()).await.unwrap();

        assert_eq!(fetcher.calls_for("m2"), 1, "terminal kinds get no retry pass");
        assert_eq!(result.owners["A"].resource_ids, vec!["m1"]);
        assert_eq!(result.owners["B"].resource_ids, vec!["m3"]);
        assert_eq!(result.errors.total_errors, 1);
        let not_found = &result.errors.errors_by_category["not_found_404"];
        assert_eq!(not_found.resource_ids, vec!["m2"]);
        assert!(!result.resources.contains_key("m2"));
    }

    #[tokio::test]
    async fn empty_listing_records_owner_without_references() {
        let dir = TempDir::new().unwrap();
        let lister = Arc::new(StaticLister::with(&[("A", &["m1"]), ("B", &[])]));
        let fetcher = Arc::new(ScriptedFetcher::default());
        let collector = collector_in(
            &dir,
            Arc::clone(&lister),
            Arc::clone(&fetcher),
            CollectorOptions::default(),
        );

        let result = collector.run(&owner_names()).await.unwrap();

        assert_eq!(result.stats.owners_with_no_references, vec!["B"]);
        assert!(result.owners["B"].reference_ids.is_empty());
        let not_found = &result.errors.errors_by_category["not_found_404"];
        assert_eq!(not_found.owner_ids, vec!["B"]);
    }

    #[tokio::test]
    async fn listing_failure_keeps_owner_with_empty_references() {
        let dir = TempDir::new().unwrap();
        let mut lister = StaticLister::with(&[("A", &["m1"])]);
        lister
            .fail_owners
            .insert("B".to_string(), ErrorKind::Timeout);
        let lister = Arc::new(lister);
        let fetcher = Arc::new(ScriptedFetcher::default());
        let collector = collector_in(
            &dir,
            Arc::clone(&lister),
            Arc::clone(&fetcher),
            CollectorOptions::default(),
        );

        let result = collector.run(&owner_names()).await.unwrap();

        assert!(result.owners["B"].reference_ids.is_empty());
        let timeouts = &result.errors.errors_by_category["timeout"];
        assert_eq!(timeouts.owner_ids, vec!["B"]);
        assert_eq!(result.resources.len(), 1);
    }

    #[tokio::test]
    async fn listing_pages_until_short_page() {
        let dir = TempDir::new().unwrap();
        let lister = Arc::new(StaticLister::with(&[(
            "A",
            &["m1", "m2", "m3", "m4", "m5"],
        )]));
        let fetcher = Arc::new(ScriptedFetcher::default());
        let options = CollectorOptions {
            page_size: 2,
            ..CollectorOptions::default()
        };
        let collector = collector_in(&dir, Arc::clone(&lister), Arc::clone(&fetcher), options);

        let result = collector.run(&["A".to_string()]).await.unwrap();

        let calls = lister.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                ("A".to_string(), 0),
                ("A".to_string(), 2),
                ("A".to_string(), 4)
            ]
        );
        assert_eq!(result.stats.total_references, 5);
        assert_eq!(result.owners["A"].reference_ids.len(), 5);
    }

    #[tokio::test]
    async fn auth_failure_aborts_run_and_saves_checkpoint() {
        let dir = TempDir::new().unwrap();
        let lister = Arc::new(overlapping_owners());
        let fetcher =
            Arc::new(ScriptedFetcher::default().always_fail("m3", ErrorKind::Unauthorized));
        let options = CollectorOptions {
            max_concurrency: 1,
            ..CollectorOptions::default()
        };
        let collector = collector_in(&dir, Arc::clone(&lister), Arc::clone(&fetcher), options);

        let err = collector.run(&owner_names()).await.unwrap_err();
        assert!(matches!(
            err,
            CollectorError::AuthAborted {
                kind: ErrorKind::Unauthorized
            }
        ));

        let store = CheckpointStore::new(dir.path().join("checkpoint.json"));
        let snapshot = store.load().await.expect("abort should leave a checkpoint");
        assert!(snapshot.references_complete);
        assert_eq!(snapshot.resources.len(), 2, "m1 and m2 were fetched before the abort");
    }

    #[tokio::test]
    async fn resume_skips_reference_phase_and_cached_resources() {
        let dir = TempDir::new().unwrap();

        let first_fetcher =
            Arc::new(ScriptedFetcher::default().always_fail("m3", ErrorKind::Unauthorized));
        let options = CollectorOptions {
            max_concurrency: 1,
            ..CollectorOptions::default()
        };
        let first = collector_in(
            &dir,
            Arc::new(overlapping_owners()),
            Arc::clone(&first_fetcher),
            options.clone(),
        );
        first.run(&owner_names()).await.unwrap_err();

        let resumed_lister = Arc::new(overlapping_owners());
        let resumed_fetcher = Arc::new(ScriptedFetcher::default());
        let resumed = collector_in(
            &dir,
            Arc::clone(&resumed_lister),
            Arc::clone(&resumed_fetcher),
            options,
        );
        let result = resumed.run(&owner_names()).await.unwrap();

        assert_eq!(resumed_lister.call_count(), 0, "reference phase should be reused");
        assert_eq!(resumed_fetcher.calls_for("m1"), 0);
        assert_eq!(resumed_fetcher.calls_for("m2"), 0);
        assert_eq!(resumed_fetcher.calls_for("m3"), 1);
        assert_eq!(result.stats.cache_hits, 2);

        // Same cache keys as an uninterrupted run.
        let mut keys: Vec<&str> = result.resources.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["m1", "m2", "m3"]);
        assert_eq!(result.owners["A"].resource_ids, vec!["m1", "m2"]);
        assert_eq!(result.owners["B"].resource_ids, vec!["m2", "m3"]);
        assert!(!dir.path().join("checkpoint.json").exists());
    }

    #[tokio::test]
    async fn circuit_open_aborts_run() {
        let dir = TempDir::new().unwrap();
        let lister = Arc::new(overlapping_owners());
        let fetcher = Arc::new(ScriptedFetcher {
            circuit_open: true,
            ..ScriptedFetcher::default()
        });
        let collector = collector_in(
            &dir,
            Arc::clone(&lister),
            Arc::clone(&fetcher),
            CollectorOptions::default(),
        );

        let err = collector.run(&owner_names()).await.unwrap_err();
        assert!(matches!(err, CollectorError::CircuitOpen));
        assert!(dir.path().join("checkpoint.json").exists());
    }

    #[tokio::test]
    async fn cancelled_token_interrupts_run_with_checkpoint() {
        let dir = TempDir::new().unwrap();
        let lister = Arc::new(overlapping_owners());
        let fetcher = Arc::new(ScriptedFetcher::default());
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let collector = collector_in(
            &dir,
            Arc::clone(&lister),
            Arc::clone(&fetcher),
            CollectorOptions::default(),
        )
        .with_shutdown(shutdown);

        let err = collector.run(&owner_names()).await.unwrap_err();
        assert!(matches!(err, CollectorError::Interrupted));
        assert!(dir.path().join("checkpoint.json").exists());
    }
}

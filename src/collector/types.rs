//! Output shapes handed to downstream consumers of a collection run.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::error_handling::LedgerReport;

/// One owner's final view of the collection.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OwnerRecord {
    /// Every reference discovered for this owner, in listing order.
    pub reference_ids: Vec<String>,
    /// The subset of references that resolved to a cached payload.
    ///
    /// A reference missing here failed to fetch; the error summary records
    /// why.
    pub resource_ids: Vec<String>,
}

/// A fetched payload that looks truncated but was kept for analysis.
#[derive(Debug, Clone, Serialize)]
pub struct IncompleteResource {
    /// Resource the payload belongs to.
    pub resource_id: String,
    /// Participants present in the payload.
    pub participant_count: usize,
    /// Queue the match was played in, when the payload says.
    pub queue_id: Option<i64>,
}

/// Counters and timing for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectionStats {
    /// Owners given to the run.
    pub owners_processed: usize,
    /// References gathered across all owners, duplicates included.
    pub total_references: usize,
    /// Distinct resource IDs after deduplication.
    pub unique_resources: usize,
    /// Resources fetched over the network this run, retry recoveries included.
    pub resources_fetched: usize,
    /// Unique IDs skipped because a loaded checkpoint already held them.
    pub cache_hits: usize,
    /// Fetches avoided by deduplicating references shared between owners.
    pub api_calls_saved: usize,
    /// Resources recovered by the automatic retry pass.
    pub recovered_on_retry: usize,
    /// Owners whose reference listing came back empty.
    pub owners_with_no_references: Vec<String>,
    /// Payloads flagged as incomplete during fetch.
    pub incomplete_resources: Vec<IncompleteResource>,
    /// Wall-clock duration of the run in seconds.
    pub collection_time_seconds: f64,
}

/// The artifact a completed run hands to external collaborators.
///
/// Partial success is the normal terminal state: the run completes even when
/// individual resources failed, and `errors` tells consumers what is missing
/// and why.
#[derive(Debug, Serialize)]
pub struct CollectionResult {
    /// Per-owner reference lists and resolved resources.
    pub owners: BTreeMap<String, OwnerRecord>,
    /// Fetched payloads keyed by resource ID.
    pub resources: BTreeMap<String, Value>,
    /// Run counters and timing.
    pub stats: CollectionStats,
    /// Capped error summary accumulated across the run.
    pub errors: LedgerReport,
}

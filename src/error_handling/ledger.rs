//! Per-kind failure accounting for a collection run.
//!
//! The ledger accumulates every failed resource and owner under its
//! [`ErrorKind`], across both the main fetch phase and the bulk retry pass.
//! When a retry later succeeds the resource is struck from the ledger, so the
//! final report only names failures that stayed failed.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::config::{LEDGER_MESSAGE_CAP, LEDGER_SAMPLE_CAP};
use crate::error_handling::types::ErrorKind;

#[derive(Debug, Default)]
struct KindEntry {
    count: usize,
    resource_ids: Vec<String>,
    owner_ids: Vec<String>,
    messages: Vec<String>,
}

/// Thread-safe failure ledger keyed by [`ErrorKind`].
///
/// Updates are append-only and safe for concurrent fetch workers; the lock is
/// never held across an await point.
#[derive(Debug)]
pub struct ErrorLedger {
    entries: Mutex<HashMap<ErrorKind, KindEntry>>,
}

/// One kind's slice of the reported error summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryReport {
    /// Failures recorded under this kind (retry successes already deducted).
    pub count: usize,
    /// Affected resource IDs, deduplicated and capped for report size.
    pub resource_ids: Vec<String>,
    /// Affected owner IDs, deduplicated and capped for report size.
    pub owner_ids: Vec<String>,
    /// Raw error text samples (uncategorized failures only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<String>,
}

/// Serializable view of the ledger handed to downstream consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerReport {
    /// Total failures that stayed failed.
    pub total_errors: usize,
    /// Per-kind breakdown, keyed by [`ErrorKind::as_str`] names.
    pub errors_by_category: BTreeMap<String, CategoryReport>,
    /// Union of all failed resource IDs across kinds, sorted.
    pub failed_resource_ids: Vec<String>,
    /// Union of all failed owner IDs across kinds, sorted.
    pub failed_owner_ids: Vec<String>,
}

impl ErrorLedger {
    /// Creates an empty ledger with an entry for every kind.
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        for kind in ErrorKind::iter() {
            entries.insert(kind, KindEntry::default());
        }
        ErrorLedger {
            entries: Mutex::new(entries),
        }
    }

    /// Records a failed resource fetch.
    pub fn record_resource(&self, kind: ErrorKind, resource_id: &str) {
        self.record(kind, Some(resource_id), None, None);
    }

    /// Records a failed resource fetch with the raw error text.
    ///
    /// The text is only kept for `Other`, where the kind alone says nothing.
    pub fn record_resource_with_detail(&self, kind: ErrorKind, resource_id: &str, detail: &str) {
        self.record(kind, Some(resource_id), None, Some(detail));
    }

    /// Records a failed owner reference listing.
    pub fn record_owner(&self, kind: ErrorKind, owner_id: &str) {
        self.record(kind, None, Some(owner_id), None);
    }

    fn record(
        &self,
        kind: ErrorKind,
        resource_id: Option<&str>,
        owner_id: Option<&str>,
        detail: Option<&str>,
    ) {
        let mut entries = self.entries.lock().expect("ledger lock poisoned");
        let entry = entries.entry(kind).or_default();
        entry.count += 1;
        if let Some(id) = resource_id {
            entry.resource_ids.push(id.to_string());
        }
        if let Some(id) = owner_id {
            entry.owner_ids.push(id.to_string());
        }
        if let (Some(detail), ErrorKind::Other) = (detail, kind) {
            let mut text = detail.to_string();
            text.truncate(LEDGER_MESSAGE_CAP);
            entry.messages.push(text);
        }
    }

    /// Strikes a resource from every kind after a later retry succeeded.
    ///
    /// Returns `true` if the resource was present anywhere in the ledger.
    pub fn absorb_retry_success(&self, resource_id: &str) -> bool {
        let mut entries = self.entries.lock().expect("ledger lock poisoned");
        let mut removed_any = false;
        for entry in entries.values_mut() {
            let before = entry.resource_ids.len();
            entry.resource_ids.retain(|id| id != resource_id);
            let removed = before - entry.resource_ids.len();
            if removed > 0 {
                entry.count = entry.count.saturating_sub(removed);
                removed_any = true;
            }
        }
        removed_any
    }

    /// Total failures currently on the ledger.
    pub fn total_errors(&self) -> usize {
        let entries = self.entries.lock().expect("ledger lock poisoned");
        entries.values().map(|e| e.count).sum()
    }

    /// Whether any failure is currently recorded.
    pub fn is_empty(&self) -> bool {
        self.total_errors() == 0
    }

    /// Failures recorded under one kind.
    pub fn kind_count(&self, kind: ErrorKind) -> usize {
        let entries = self.entries.lock().expect("ledger lock poisoned");
        entries.get(&kind).map_or(0, |e| e.count)
    }

    /// Deduplicated, sorted resource IDs that failed with a retryable kind.
    ///
    /// This is the bulk retry pass's work list. Terminal kinds are excluded:
    /// retrying a 404 or a rejected request shape cannot succeed.
    pub fn retryable_resource_ids(&self) -> Vec<String> {
        let entries = self.entries.lock().expect("ledger lock poisoned");
        let mut ids: Vec<String> = entries
            .iter()
            .filter(|(kind, _)| kind.is_retryable())
            .flat_map(|(_, entry)| entry.resource_ids.iter().cloned())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Builds the serializable report, capping per-kind ID samples.
    pub fn report(&self) -> LedgerReport {
        let entries = self.entries.lock().expect("ledger lock poisoned");

        let mut errors_by_category = BTreeMap::new();
        let mut failed_resource_ids: Vec<String> = Vec::new();
        let mut failed_owner_ids: Vec<String> = Vec::new();

        for (kind, entry) in entries.iter() {
            if entry.count == 0 {
                continue;
            }
            failed_resource_ids.extend(entry.resource_ids.iter().cloned());
            failed_owner_ids.extend(entry.owner_ids.iter().cloned());

            errors_by_category.insert(
                kind.as_str().to_string(),
                CategoryReport {
                    count: entry.count,
                    resource_ids: dedup_capped(&entry.resource_ids),
                    owner_ids: dedup_capped(&entry.owner_ids),
                    messages: entry.messages.iter().take(LEDGER_SAMPLE_CAP).cloned().collect(),
                },
            );
        }

        failed_resource_ids.sort_unstable();
        failed_resource_ids.dedup();
        failed_owner_ids.sort_unstable();
        failed_owner_ids.dedup();

        LedgerReport {
            total_errors: entries.values().map(|e| e.count).sum(),
            errors_by_category,
            failed_resource_ids,
            failed_owner_ids,
        }
    }
}

impl Default for ErrorLedger {
    fn default() -> Self {
        Self::new()
    }
}

fn dedup_capped(ids: &[String]) -> Vec<String> {
    let mut out: Vec<String> = ids.to_vec();
    out.sort_unstable();
    out.dedup();
    out.truncate(LEDGER_SAMPLE_CAP);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_ledger() {
        let ledger = ErrorLedger::new();
        assert!(ledger.is_empty());
        assert_eq!(ledger.total_errors(), 0);
        assert!(ledger.report().errors_by_category.is_empty());
    }

    #[test]
    fn test_record_and_count() {
        let ledger = ErrorLedger::new();
        ledger.record_resource(ErrorKind::Timeout, "m1");
        ledger.record_resource(ErrorKind::Timeout, "m2");
        ledger.record_owner(ErrorKind::ConnectionFailed, "p1");

        assert_eq!(ledger.total_errors(), 3);
        assert_eq!(ledger.kind_count(ErrorKind::Timeout), 2);
        assert_eq!(ledger.kind_count(ErrorKind::ConnectionFailed), 1);

        let report = ledger.report();
        assert_eq!(report.total_errors, 3);
        assert_eq!(report.failed_resource_ids, vec!["m1", "m2"]);
        assert_eq!(report.failed_owner_ids, vec!["p1"]);
    }

    #[test]
    fn test_retryable_work_list_excludes_terminal_kinds() {
        let ledger = ErrorLedger::new();
        ledger.record_resource(ErrorKind::Timeout, "m1");
        ledger.record_resource(ErrorKind::RateLimited, "m2");
        ledger.record_resource(ErrorKind::NotFound, "m3");
        ledger.record_resource(ErrorKind::Validation, "m4");

        assert_eq!(ledger.retryable_resource_ids(), vec!["m1", "m2"]);
    }

    #[test]
    fn test_retryable_work_list_deduplicates() {
        let ledger = ErrorLedger::new();
        ledger.record_resource(ErrorKind::Timeout, "m1");
        ledger.record_resource(ErrorKind::ServerError, "m1");
        assert_eq!(ledger.retryable_resource_ids(), vec!["m1"]);
    }

    #[test]
    fn test_absorb_retry_success() {
        let ledger = ErrorLedger::new();
        ledger.record_resource(ErrorKind::Timeout, "m1");
        ledger.record_resource(ErrorKind::ServerError, "m1");
        ledger.record_resource(ErrorKind::Timeout, "m2");

        assert!(ledger.absorb_retry_success("m1"));
        assert_eq!(ledger.total_errors(), 1);
        assert_eq!(ledger.kind_count(ErrorKind::Timeout), 1);
        assert_eq!(ledger.kind_count(ErrorKind::ServerError), 0);

        // Striking an unknown resource is a no-op
        assert!(!ledger.absorb_retry_success("m9"));
        assert_eq!(ledger.total_errors(), 1);
    }

    #[test]
    fn test_owner_failures_survive_retry_absorption() {
        let ledger = ErrorLedger::new();
        ledger.record_owner(ErrorKind::Timeout, "p1");
        ledger.record_resource(ErrorKind::Timeout, "m1");

        ledger.absorb_retry_success("m1");
        assert_eq!(ledger.kind_count(ErrorKind::Timeout), 1);
        assert_eq!(ledger.report().failed_owner_ids, vec!["p1"]);
    }

    #[test]
    fn test_report_caps_id_samples() {
        let ledger = ErrorLedger::new();
        for i in 0..(LEDGER_SAMPLE_CAP + 50) {
            ledger.record_resource(ErrorKind::Timeout, &format!("m{i:04}"));
        }

        let report = ledger.report();
        let category = &report.errors_by_category["timeout"];
        assert_eq!(category.count, LEDGER_SAMPLE_CAP + 50);
        assert_eq!(category.resource_ids.len(), LEDGER_SAMPLE_CAP);
        // The uncapped union still carries everything
        assert_eq!(report.failed_resource_ids.len(), LEDGER_SAMPLE_CAP + 50);
    }

    #[test]
    fn test_other_keeps_message_samples() {
        let ledger = ErrorLedger::new();
        ledger.record_resource_with_detail(ErrorKind::Other, "m1", "weird body shape");
        ledger.record_resource_with_detail(ErrorKind::Timeout, "m2", "is dropped");

        let report = ledger.report();
        assert_eq!(
            report.errors_by_category["other_error"].messages,
            vec!["weird body shape"]
        );
        assert!(report.errors_by_category["timeout"].messages.is_empty());
    }

    #[test]
    fn test_duplicate_ids_reported_once() {
        let ledger = ErrorLedger::new();
        ledger.record_resource(ErrorKind::Timeout, "m1");
        ledger.record_resource(ErrorKind::Timeout, "m1");

        let report = ledger.report();
        let category = &report.errors_by_category["timeout"];
        assert_eq!(category.count, 2);
        assert_eq!(category.resource_ids, vec!["m1"]);
    }
}

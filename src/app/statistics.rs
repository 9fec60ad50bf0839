//! Statistics printing for finished collection runs.

use log::{info, warn};

use crate::collector::CollectionStats;
use crate::error_handling::LedgerReport;

/// Prints final statistics for a collection run.
///
/// This function is used internally by the library and in tests.
pub fn print_final_statistics(stats: &CollectionStats, errors: &LedgerReport) {
    info!(
        "Run statistics: owners={}, references={}, unique={}, fetched={}, cache_hits={}, recovered={}",
        stats.owners_processed,
        stats.total_references,
        stats.unique_resources,
        stats.resources_fetched,
        stats.cache_hits,
        stats.recovered_on_retry
    );

    if !stats.owners_with_no_references.is_empty() {
        info!(
            "{} owner{} had no references in the requested window",
            stats.owners_with_no_references.len(),
            if stats.owners_with_no_references.len() == 1 {
                ""
            } else {
                "s"
            }
        );
    }
    if !stats.incomplete_resources.is_empty() {
        info!(
            "{} resource{} flagged incomplete",
            stats.incomplete_resources.len(),
            if stats.incomplete_resources.len() == 1 {
                ""
            } else {
                "s"
            }
        );
    }

    print_error_summary(errors);

    // Print simple one-line summary at the end
    print_simple_summary(stats, errors);
}

/// Prints a simple one-line summary of the run.
///
/// This provides immediate feedback to the user in a concise format.
/// Works with both plain and JSON log formats (log::info! handles formatting).
fn print_simple_summary(stats: &CollectionStats, errors: &LedgerReport) {
    info!(
        "✅ Collected {} unique resource{} ({} fetched, {} from cache, {} failed) in {:.1}s",
        stats.unique_resources,
        if stats.unique_resources == 1 { "" } else { "s" },
        stats.resources_fetched,
        stats.cache_hits,
        errors.failed_resource_ids.len(),
        stats.collection_time_seconds
    );
}

/// Prints the per-category error summary to the log.
///
/// This function is used internally and in tests.
pub fn print_error_summary(errors: &LedgerReport) {
    if errors.total_errors == 0 {
        return;
    }

    warn!("Collection completed with {} errors:", errors.total_errors);
    for (category, report) in &errors.errors_by_category {
        warn!(
            "   - {}: {} error{}",
            category,
            report.count,
            if report.count == 1 { "" } else { "s" }
        );
    }
    if !errors.failed_resource_ids.is_empty() {
        warn!(
            "   {} unique resource{} failed",
            errors.failed_resource_ids.len(),
            if errors.failed_resource_ids.len() == 1 {
                ""
            } else {
                "s"
            }
        );
    }
    if !errors.failed_owner_ids.is_empty() {
        warn!(
            "   {} owner listing{} failed",
            errors.failed_owner_ids.len(),
            if errors.failed_owner_ids.len() == 1 {
                ""
            } else {
                "s"
            }
        );
    }
}

//! Error handling and failure accounting.
//!
//! This module provides:
//! - Error type definitions and response categorization
//! - The per-kind failure ledger built up during a collection run
//! - Retry-After extraction from throttled and server-error responses
//!
//! Failure kinds split into:
//! - **Retryable**: throttling, server errors, timeouts, connection drops
//! - **Terminal**: auth rejections, missing resources, rejected request shapes

mod categorization;
mod ledger;
mod types;

// Re-export public API
pub use categorization::{categorize_status, categorize_transport};
pub use ledger::{CategoryReport, ErrorLedger, LedgerReport};
pub use types::{CollectorError, ErrorKind, FetchError, InitializationError};

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_ledger_initialization() {
        let ledger = ErrorLedger::new();
        // Every kind starts at zero
        for kind in ErrorKind::iter() {
            assert_eq!(ledger.kind_count(kind), 0);
        }
    }

    #[test]
    fn test_kind_names_are_unique() {
        let mut names: Vec<&str> = ErrorKind::iter().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ErrorKind::iter().count());
    }

    #[test]
    fn test_every_kind_is_retryable_or_terminal() {
        for kind in ErrorKind::iter() {
            // is_retryable decides whether the bulk retry pass picks it up;
            // the split must be total
            let _ = kind.is_retryable();
        }
    }
}

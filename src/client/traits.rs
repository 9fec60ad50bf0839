//! Seams between the collector and the upstream service.

use serde_json::Value;

use crate::error_handling::FetchError;

/// Inclusive epoch-second bounds for reference listings.
///
/// Either side may be open. The upstream service filters server-side, so a
/// bounded window also shrinks paging work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    /// Earliest accepted timestamp, epoch seconds.
    pub start_epoch_secs: Option<i64>,
    /// Latest accepted timestamp, epoch seconds.
    pub end_epoch_secs: Option<i64>,
}

impl TimeWindow {
    /// Window covering the trailing `days` up to now.
    pub fn last_days(days: i64) -> Self {
        let end = chrono::Utc::now().timestamp();
        TimeWindow {
            start_epoch_secs: Some(end - days * 86_400),
            end_epoch_secs: Some(end),
        }
    }
}

/// Lists the match IDs an owner participated in, newest first.
#[async_trait::async_trait]
pub trait ReferenceLister: Send + Sync {
    /// Fetches one page of match IDs for `owner_id`.
    ///
    /// # Arguments
    ///
    /// * `owner_id` - The player the listing belongs to
    /// * `start` - Zero-based offset into the owner's history
    /// * `count` - Page size the service is asked for
    /// * `window` - Optional server-side time filter
    ///
    /// An empty page means the history is exhausted.
    async fn list_references(
        &self,
        owner_id: &str,
        start: usize,
        count: usize,
        window: Option<&TimeWindow>,
    ) -> Result<Vec<String>, FetchError>;
}

/// Fetches one match record by ID.
#[async_trait::async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Fetches the full record for `resource_id`.
    async fn fetch_resource(&self, resource_id: &str) -> Result<Value, FetchError>;
}

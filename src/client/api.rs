//! Concrete client for the match API.

use serde_json::Value;

use super::requester::RetryingRequester;
use super::traits::{ReferenceLister, ResourceFetcher, TimeWindow};
use crate::error_handling::FetchError;

/// Client for the upstream match endpoints.
///
/// Owns URL construction; transport, pacing, and retry live in the
/// [`RetryingRequester`] underneath.
pub struct ApiClient {
    requester: RetryingRequester,
    base_url: String,
}

impl ApiClient {
    /// Creates a client rooted at `base_url`.
    pub fn new(requester: RetryingRequester, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        ApiClient {
            requester,
            base_url,
        }
    }

    fn reference_listing_url(&self, owner_id: &str) -> String {
        format!(
            "{}/tft/match/v1/matches/by-puuid/{}/ids",
            self.base_url, owner_id
        )
    }

    fn resource_url(&self, resource_id: &str) -> String {
        format!("{}/tft/match/v1/matches/{}", self.base_url, resource_id)
    }
}

#[async_trait::async_trait]
impl ReferenceLister for ApiClient {
    async fn list_references(
        &self,
        owner_id: &str,
        start: usize,
        count: usize,
        window: Option<&TimeWindow>,
    ) -> Result<Vec<String>, FetchError> {
        let mut query: Vec<(&str, String)> =
            vec![("start", start.to_string()), ("count", count.to_string())];
        if let Some(window) = window {
            if let Some(start_time) = window.start_epoch_secs {
                query.push(("startTime", start_time.to_string()));
            }
            if let Some(end_time) = window.end_epoch_secs {
                query.push(("endTime", end_time.to_string()));
            }
        }

        let value = self
            .requester
            .get_json(&self.reference_listing_url(owner_id), &query)
            .await?;
        serde_json::from_value(value).map_err(|e| {
            FetchError::InvalidPayload(format!("reference listing for {owner_id}: {e}"))
        })
    }
}

#[async_trait::async_trait]
impl ResourceFetcher for ApiClient {
    async fn fetch_resource(&self, resource_id: &str) -> Result<Value, FetchError> {
        self.requester
            .get_json(&self.resource_url(resource_id), &[])
            .await
    }
}

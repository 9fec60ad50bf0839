//! HTTP access to the upstream match service.
//!
//! This module provides:
//! - The retrying, rate-limited request executor
//! - Backoff policy with service-suggested delay support
//! - The concrete API client and the listing/fetching traits the collector
//!   works against

mod api;
mod requester;
mod retry;
mod traits;

// Re-export public API
pub use api::ApiClient;
pub use requester::RetryingRequester;
pub use retry::RetryPolicy;
pub use traits::{ReferenceLister, ResourceFetcher, TimeWindow};

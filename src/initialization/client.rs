//! HTTP client initialization.
//!
//! This module provides functions to initialize the HTTP client with API
//! credentials attached to every request.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::ClientBuilder;

use crate::config::{Config, HEADER_API_KEY};
use crate::error_handling::InitializationError;

/// Initializes the HTTP client with default settings.
///
/// Creates a `reqwest::Client` configured with:
/// - API key header attached to every request
/// - User-Agent header from configuration
/// - Timeout from configuration
///
/// # Arguments
///
/// * `config` - Configuration containing the API key, user-agent, and timeout
///
/// # Returns
///
/// A configured HTTP client ready for making requests.
///
/// # Errors
///
/// Returns `InitializationError::CredentialError` if the API key is empty or
/// contains characters that cannot appear in a header value, or
/// `InitializationError::HttpClientError` if client creation fails.
pub fn init_client(config: &Config) -> Result<Arc<reqwest::Client>, InitializationError> {
    let key = config.api_key.trim();
    if key.is_empty() {
        return Err(InitializationError::CredentialError(
            "API key is empty; set RIOT_API_KEY or pass --api-key".into(),
        ));
    }

    let mut api_key = HeaderValue::from_str(key).map_err(|_| {
        InitializationError::CredentialError("API key contains invalid header characters".into())
    })?;
    // Keep the key out of debug output
    api_key.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(HEADER_API_KEY, api_key);

    let client = ClientBuilder::new()
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_seconds))
        .user_agent(config.user_agent.clone())
        .build()?;
    Ok(Arc::new(client))
}

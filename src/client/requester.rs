//! Rate-limited, retrying HTTP request execution.

use std::sync::Arc;

use serde_json::Value;
use tokio::time::sleep;

use super::retry::RetryPolicy;
use crate::circuit_breaker::CircuitBreaker;
use crate::error_handling::{categorize_status, categorize_transport, ErrorKind, FetchError};
use crate::rate_limit::RateLimiter;

/// Sends GET requests through the rate limiter with retry, backoff, and
/// circuit breaking.
///
/// Every attempt, the first one included, passes three gates in order: the
/// circuit breaker, the rate limiter, then the wire. Failures feed back into
/// the breaker and, for overload signals, into the limiter's budget scale.
pub struct RetryingRequester {
    client: reqwest::Client,
    limiter: Arc<RateLimiter>,
    breaker: Arc<CircuitBreaker>,
    policy: RetryPolicy,
}

impl RetryingRequester {
    /// Creates a requester over an already-configured HTTP client.
    pub fn new(
        client: reqwest::Client,
        limiter: Arc<RateLimiter>,
        breaker: Arc<CircuitBreaker>,
        policy: RetryPolicy,
    ) -> Self {
        log::info!(
            "Requester initialized: {} attempts per request, {:.1}s base backoff",
            policy.max_attempts,
            policy.base_delay_secs
        );
        RetryingRequester {
            client,
            limiter,
            breaker,
            policy,
        }
    }

    /// Fetches `url` and parses the body as JSON, retrying retryable failures.
    ///
    /// Terminal failures (auth rejections, missing resources, rejected
    /// request shapes) return after the first response. Retryable ones are
    /// reattempted up to the policy's budget with backoff between attempts.
    pub async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Value, FetchError> {
        for attempt in 0..self.policy.max_attempts {
            if self.breaker.is_open().await {
                log::error!("Circuit breaker open, refusing request to {url}");
                return Err(FetchError::CircuitOpen);
            }

            self.limiter.check_and_wait().await;

            match self.execute(url, query).await {
                Ok(value) => {
                    self.breaker.record_success().await;
                    return Ok(value);
                }
                Err(error) => {
                    if error.kind() == Some(ErrorKind::RateLimited) {
                        self.limiter.record_overload();
                    }

                    match &error {
                        // A malformed body still means the service answered;
                        // the failure streak resets
                        FetchError::InvalidPayload(_) => self.breaker.record_success().await,
                        _ if error
                            .kind()
                            .is_some_and(|kind| kind.counts_toward_circuit()) =>
                        {
                            self.breaker.record_failure().await;
                        }
                        _ => {}
                    }

                    if error.is_retryable() && attempt + 1 < self.policy.max_attempts {
                        let delay = self.policy.delay_for(attempt, error.suggested_delay());
                        log::warn!(
                            "Request to {url} failed ({error}), retrying (attempt {}/{}) after {:.2}s",
                            attempt + 1,
                            self.policy.max_attempts,
                            delay.as_secs_f64()
                        );
                        sleep(delay).await;
                        continue;
                    }

                    if error.is_retryable() {
                        log::error!("Max retries exceeded for {url}: {error}");
                    } else if error.kind() == Some(ErrorKind::NotFound) {
                        log::warn!("Resource not found: {url}");
                    } else {
                        log::error!("Request to {url} failed: {error}");
                    }
                    return Err(error);
                }
            }
        }

        // Unreachable with a nonzero attempt budget, but satisfies the compiler
        Err(FetchError::CircuitOpen)
    }

    async fn execute(&self, url: &str, query: &[(&str, String)]) -> Result<Value, FetchError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| categorize_transport(&e))?;

        if let Some(error) = categorize_status(response.status(), response.headers()) {
            return Err(error);
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| FetchError::InvalidPayload(e.to_string()))
    }
}

//! Failure categorization for API outcomes.
//!
//! Maps raw HTTP statuses and transport errors onto the [`ErrorKind`]
//! taxonomy, extracting the server-suggested retry delay where one is given.

use log::{info, warn};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;

use crate::error_handling::types::{ErrorKind, FetchError};

/// Categorizes an HTTP response status.
///
/// Returns `None` for success statuses (2xx). Everything else maps to a
/// [`FetchError::Status`] whose kind follows the fixed table:
///
/// - 401 -> `Unauthorized`, 403 -> `Forbidden` (terminal; the credential is dead)
/// - 404 -> `NotFound` (terminal; the resource is missing)
/// - 429 -> `RateLimited` (retryable, honors `Retry-After`)
/// - 400/422 -> `Validation` (terminal; the request shape was rejected)
/// - 5xx -> `ServerError` (retryable, honors `Retry-After`)
/// - anything else -> `Other` (terminal)
pub fn categorize_status(status: StatusCode, headers: &HeaderMap) -> Option<FetchError> {
    if status.is_success() {
        return None;
    }

    let code = status.as_u16();
    let (kind, suggested_delay) = match code {
        401 => (ErrorKind::Unauthorized, None),
        403 => (ErrorKind::Forbidden, None),
        404 => (ErrorKind::NotFound, None),
        429 => (ErrorKind::RateLimited, parse_retry_after(headers)),
        400 | 422 => (ErrorKind::Validation, None),
        500..=599 => (ErrorKind::ServerError, parse_retry_after(headers)),
        _ => (ErrorKind::Other, None),
    };

    Some(FetchError::Status {
        kind,
        status: code,
        suggested_delay,
    })
}

/// Categorizes a transport-level error (no HTTP response arrived).
///
/// Timeouts and connection failures are retryable; anything else is `Other`.
pub fn categorize_transport(error: &reqwest::Error) -> FetchError {
    let kind = if error.is_timeout() {
        ErrorKind::Timeout
    } else if error.is_connect() || error.is_request() {
        ErrorKind::ConnectionFailed
    } else {
        ErrorKind::Other
    };

    FetchError::Transport {
        kind,
        detail: error.to_string(),
    }
}

/// Extracts a `Retry-After` delay in seconds.
///
/// The service sends plain seconds, so only the numeric form is parsed; a
/// malformed value is logged and ignored rather than guessed at.
fn parse_retry_after(headers: &HeaderMap) -> Option<f64> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?;
    match raw.trim().parse::<f64>() {
        Ok(secs) if secs >= 0.0 => {
            info!("Server specified Retry-After: {secs} seconds");
            Some(secs)
        }
        _ => {
            warn!("Invalid Retry-After header value: {raw}");
            None
        }
    }
}

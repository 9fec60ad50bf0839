//! Error type definitions.
//!
//! This module defines the failure taxonomy for the request pipeline and the
//! fatal error types for a collection run.

use log::SetLoggerError;
use reqwest::Error as ReqwestError;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error initializing the HTTP client.
    #[error("HTTP client initialization error: {0}")]
    HttpClientError(#[from] ReqwestError),

    /// The API key is missing or malformed.
    #[error("API credential error: {0}")]
    CredentialError(String),
}

/// Classified failure kinds for a single API request.
///
/// Every failed request maps to exactly one kind; the kind determines whether
/// the request is retried and whether the failure counts toward the circuit
/// breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum ErrorKind {
    /// HTTP 429: the service shed load
    RateLimited,
    /// HTTP 401: bad or expired credential
    Unauthorized,
    /// HTTP 403: revoked credential or missing permission
    Forbidden,
    /// HTTP 404: the resource does not exist
    NotFound,
    /// HTTP 5xx
    ServerError,
    /// The request timed out before a response arrived
    Timeout,
    /// The connection could not be established
    ConnectionFailed,
    /// HTTP 400/422: the request shape was rejected
    Validation,
    /// Anything else
    Other,
}

impl ErrorKind {
    /// Stable snake_case name used as the ledger/report key.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::RateLimited => "rate_limit_429",
            ErrorKind::Unauthorized => "unauthorized_401",
            ErrorKind::Forbidden => "forbidden_403",
            ErrorKind::NotFound => "not_found_404",
            ErrorKind::ServerError => "server_error_5xx",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ConnectionFailed => "connection_error",
            ErrorKind::Validation => "validation_error",
            ErrorKind::Other => "other_error",
        }
    }

    /// Whether a failure of this kind may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimited
                | ErrorKind::ServerError
                | ErrorKind::Timeout
                | ErrorKind::ConnectionFailed
        )
    }

    /// Whether this kind aborts the run because the credential is dead.
    pub fn is_auth(&self) -> bool {
        matches!(self, ErrorKind::Unauthorized | ErrorKind::Forbidden)
    }

    /// Whether this kind counts toward the consecutive-failure circuit.
    ///
    /// A missing resource is a data condition, not a service failure, so 404
    /// neither trips nor resets the circuit.
    pub fn counts_toward_circuit(&self) -> bool {
        !matches!(self, ErrorKind::NotFound)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by the request pipeline for one resource.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The service answered with a non-success status.
    #[error("request failed ({kind}, status {status})")]
    Status {
        /// Classified failure kind.
        kind: ErrorKind,
        /// Raw HTTP status code.
        status: u16,
        /// Server-suggested retry delay in seconds, from `Retry-After`.
        suggested_delay: Option<f64>,
    },

    /// The request never produced an HTTP response.
    #[error("transport error ({kind}): {detail}")]
    Transport {
        /// Classified failure kind.
        kind: ErrorKind,
        /// Underlying transport error text.
        detail: String,
    },

    /// The response body was not the expected JSON shape.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The circuit breaker rejected the call without contacting the network.
    #[error("circuit breaker open: too many consecutive failures")]
    CircuitOpen,
}

impl FetchError {
    /// The classified kind, or `None` for the cross-cutting circuit-open case.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            FetchError::Status { kind, .. } | FetchError::Transport { kind, .. } => Some(*kind),
            FetchError::InvalidPayload(_) => Some(ErrorKind::Other),
            FetchError::CircuitOpen => None,
        }
    }

    /// Whether the failed request may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        self.kind().is_some_and(|k| k.is_retryable())
    }

    /// Server-suggested retry delay in seconds, if the response carried one.
    pub fn suggested_delay(&self) -> Option<f64> {
        match self {
            FetchError::Status {
                suggested_delay, ..
            } => *suggested_delay,
            _ => None,
        }
    }

    /// Whether this failure means the credential is dead.
    pub fn is_auth(&self) -> bool {
        self.kind().is_some_and(|k| k.is_auth())
    }

    /// Whether the circuit breaker short-circuited this call.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, FetchError::CircuitOpen)
    }

    /// The run-ending error this failure maps to, if it maps to one.
    ///
    /// Dead credentials and an open circuit end the run; everything else is
    /// recorded per resource and the run continues.
    pub fn as_fatal(&self) -> Option<CollectorError> {
        if self.is_circuit_open() {
            return Some(CollectorError::CircuitOpen);
        }
        match self.kind() {
            Some(kind) if kind.is_auth() => Some(CollectorError::AuthAborted { kind }),
            _ => None,
        }
    }
}

/// Fatal errors that end a collection run.
///
/// Per-resource failures are absorbed into the error ledger and never surface
/// here; these variants cover the conditions that make continuing pointless
/// or unsafe. All of them leave a valid checkpoint behind.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// The credential was rejected mid-run (expired or revoked key).
    #[error("authentication failed ({kind}): collection aborted, checkpoint saved")]
    AuthAborted {
        /// Which auth kind triggered the abort.
        kind: ErrorKind,
    },

    /// The circuit breaker opened: the service is effectively down.
    #[error("circuit breaker open: remote service unavailable, checkpoint saved")]
    CircuitOpen,

    /// An interrupt signal ended the run early.
    #[error("collection interrupted, checkpoint saved")]
    Interrupted,

    /// The checkpoint file could not be written or removed.
    #[error("checkpoint I/O error: {0}")]
    CheckpointIo(#[from] std::io::Error),

    /// The checkpoint snapshot could not be serialized.
    #[error("checkpoint serialization error: {0}")]
    CheckpointEncode(#[from] serde_json::Error),
}

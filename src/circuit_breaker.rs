//! Circuit breaker for upstream request failures.
//!
//! Stops hammering the upstream service when requests fail back to back.
//! The circuit is open while the consecutive failure count is at or above a
//! threshold and the latest failure is recent; once the streak goes stale the
//! next attempt is allowed through.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::config::{CIRCUIT_BREAKER_COOLDOWN, CIRCUIT_BREAKER_THRESHOLD};

/// Tracks consecutive request failures against the upstream service.
///
/// A success anywhere in the stream resets the streak. Failures that say
/// nothing about service health (a missing resource, for instance) should not
/// be recorded here at all.
pub struct CircuitBreaker {
    /// Consecutive failures before the circuit opens
    failure_threshold: u32,
    /// How recent the latest failure must be for the circuit to stay open
    cooldown: Duration,
    /// Current consecutive failure count
    failure_count: AtomicU32,
    /// When the latest counted failure happened
    last_failure_at: RwLock<Option<Instant>>,
}

impl CircuitBreaker {
    /// Creates a breaker with the standard threshold and cooldown.
    pub fn new() -> Self {
        Self::with_threshold(CIRCUIT_BREAKER_THRESHOLD, CIRCUIT_BREAKER_COOLDOWN)
    }

    /// Creates a breaker with custom settings.
    ///
    /// # Arguments
    ///
    /// * `failure_threshold` - Consecutive failures before the circuit opens
    /// * `cooldown` - How long an untouched streak keeps the circuit open
    pub fn with_threshold(failure_threshold: u32, cooldown: Duration) -> Self {
        CircuitBreaker {
            failure_threshold,
            cooldown,
            failure_count: AtomicU32::new(0),
            last_failure_at: RwLock::new(None),
        }
    }

    /// Records a successful request, ending any failure streak.
    pub async fn record_success(&self) {
        let previous = self.failure_count.swap(0, Ordering::SeqCst);
        if previous >= self.failure_threshold {
            log::info!(
                "Circuit breaker: streak of {} failures ended by a successful request",
                previous
            );
        }
    }

    /// Records a failure that counts against the streak.
    pub async fn record_failure(&self) {
        let count = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_failure_at.write().await = Some(Instant::now());

        if count == self.failure_threshold {
            log::error!(
                "Circuit breaker: circuit opened after {} consecutive failures",
                count
            );
        }
    }

    /// Whether requests should currently be blocked.
    ///
    /// Open means the streak is at or above the threshold and its latest
    /// failure is younger than the cooldown. A stale streak lets the next
    /// attempt through; another failure re-opens the circuit immediately.
    pub async fn is_open(&self) -> bool {
        if self.failure_count.load(Ordering::SeqCst) < self.failure_threshold {
            return false;
        }

        let last_failure_at = self.last_failure_at.read().await;
        match *last_failure_at {
            Some(at) => at.elapsed() < self.cooldown,
            None => false,
        }
    }

    /// Current consecutive failure count (for monitoring).
    pub fn failure_count(&self) -> u32 {
        self.failure_count.load(Ordering::SeqCst)
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

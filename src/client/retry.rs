//! Backoff schedule for retryable request failures.

use std::time::Duration;

use rand::Rng;

use crate::config::{
    RatePreset, RETRY_BASE_DELAY_SECS, RETRY_EXPONENTIAL_BASE, RETRY_JITTER_FRACTION,
    RETRY_MAX_ATTEMPTS, RETRY_MAX_DELAY_SECS, RETRY_MIN_DELAY_SECS,
};

/// Retry schedule: exponential backoff with jitter, or the delay the service
/// asked for.
///
/// A `Retry-After` value overrides the exponential schedule entirely, floored
/// at the minimum delay but never capped. The exponential branch is clamped
/// to `[min_delay_secs, max_delay_secs]` before jitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per request, the first one included.
    pub max_attempts: usize,
    /// Seed delay for the exponential schedule, in seconds.
    pub base_delay_secs: f64,
    /// Lower bound on every computed delay, in seconds.
    pub min_delay_secs: f64,
    /// Upper bound on the exponential branch, in seconds.
    pub max_delay_secs: f64,
    /// Growth factor per attempt.
    pub exponential_base: f64,
    /// Jitter drawn uniformly from `[0, base * fraction]`.
    pub jitter_fraction: f64,
}

impl RetryPolicy {
    /// Policy matching a named credential tier.
    ///
    /// Tiers differ only in the seed delay: generous budgets recover fast,
    /// tight ones back off long.
    pub fn for_preset(preset: RatePreset) -> Self {
        let base_delay_secs = match preset {
            RatePreset::Personal => 10.0,
            RatePreset::Production => 1.0,
            RatePreset::Development => 15.0,
        };
        RetryPolicy {
            base_delay_secs,
            ..RetryPolicy::default()
        }
    }

    /// Delay before the retry following `attempt` (zero-based).
    ///
    /// `suggested_secs` carries the service's `Retry-After` value when one was
    /// sent.
    pub fn delay_for(&self, attempt: usize, suggested_secs: Option<f64>) -> Duration {
        let base = match suggested_secs {
            Some(suggested) => suggested.max(self.min_delay_secs),
            None => (self.base_delay_secs * self.exponential_base.powi(attempt as i32))
                .min(self.max_delay_secs)
                .max(self.min_delay_secs),
        };

        let jitter = rand::rng().random_range(0.0..=(base * self.jitter_fraction));
        Duration::from_secs_f64((base + jitter).max(self.min_delay_secs))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: RETRY_MAX_ATTEMPTS,
            base_delay_secs: RETRY_BASE_DELAY_SECS,
            min_delay_secs: RETRY_MIN_DELAY_SECS,
            max_delay_secs: RETRY_MAX_DELAY_SECS,
            exponential_base: RETRY_EXPONENTIAL_BASE,
            jitter_fraction: RETRY_JITTER_FRACTION,
        }
    }
}

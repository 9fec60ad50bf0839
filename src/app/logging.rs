//! Progress logging utilities.

use log::info;

use crate::circuit_breaker::CircuitBreaker;
use crate::rate_limit::RateLimiter;

/// Logs progress information about the running collection.
///
/// Reads the limiter's request counters for throughput and window occupancy.
/// Skips the tick silently when an admission wait holds the limiter lock.
///
/// # Arguments
///
/// * `start_time` - The start time of the collection run
/// * `limiter` - Shared rate limiter issuing the request budget
/// * `breaker` - Shared circuit breaker tracking consecutive failures
pub fn log_progress(
    start_time: std::time::Instant,
    limiter: &RateLimiter,
    breaker: &CircuitBreaker,
) {
    let Some(stats) = limiter.stats() else {
        return;
    };
    let elapsed_secs = start_time.elapsed().as_secs_f64();
    let rate = if elapsed_secs > 0.0 {
        stats.total_requests as f64 / elapsed_secs
    } else {
        0.0
    };
    info!(
        "Issued {} API requests in {:.2} seconds (~{:.2} req/sec); budget {}/{} short, {}/{} long, scale {:.2}",
        stats.total_requests,
        elapsed_secs,
        rate,
        stats.requests_in_short_window,
        stats.effective_short_limit,
        stats.requests_in_long_window,
        stats.effective_long_limit,
        stats.scale
    );
    let failures = breaker.failure_count();
    if failures > 0 {
        info!("Circuit breaker: {} consecutive failures", failures);
    }
}

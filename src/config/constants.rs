//! Configuration constants.
//!
//! This module defines the default operational parameters used throughout the
//! collector: rate-limit windows and budgets, retry strategy, circuit breaker
//! thresholds, and checkpoint cadence.

use std::time::Duration;

// Rate limiting windows
/// Short rate-limit window span (per-second budget).
pub const SHORT_WINDOW: Duration = Duration::from_secs(1);
/// Long rate-limit window span (per-two-minutes budget).
pub const LONG_WINDOW: Duration = Duration::from_secs(120);
/// Default request budget for the short window (personal API key tier).
pub const MAX_REQUESTS_PER_SECOND: usize = 20;
/// Default request budget for the long window (personal API key tier).
pub const MAX_REQUESTS_PER_TWO_MINUTES: usize = 100;
/// Slack added to every computed sleep so a request lands just after a slot frees.
pub const RATE_BUFFER_SECS: f64 = 0.1;
/// Floor applied to every rate-limit sleep.
pub const MIN_SLEEP_SECS: f64 = 2.0;
/// Extra sleep when the long window is completely exhausted.
pub const LONG_WINDOW_SAFETY_MARGIN_SECS: f64 = 5.0;
/// Number of long-window slots kept free proactively.
pub const PROACTIVE_LONG_WINDOW_SLOTS: usize = 1;

// Dynamic rate adjustment
/// Rolling window over which overload (429) signals are counted.
pub const OVERLOAD_WINDOW: Duration = Duration::from_secs(300);
/// Overload signals tolerated within [`OVERLOAD_WINDOW`] before budgets shrink.
pub const OVERLOAD_TOLERANCE: usize = 5;
/// Budget reduction per overload signal beyond the tolerance.
pub const SCALE_REDUCTION_STEP: f64 = 0.1;
/// Lowest multiplier the dynamic scale can reach.
pub const SCALE_FLOOR: f64 = 0.5;
/// Recovery applied per overload-free signal once the window clears.
pub const SCALE_RECOVERY_STEP: f64 = 0.05;

// Retry strategy
/// Total attempts per resource before the failure is recorded.
pub const RETRY_MAX_ATTEMPTS: usize = 10;
/// Base delay in seconds before the first retry (personal API key tier).
pub const RETRY_BASE_DELAY_SECS: f64 = 10.0;
/// Floor applied to every retry delay.
pub const RETRY_MIN_DELAY_SECS: f64 = 1.0;
/// Cap applied to the exponential-backoff branch of the retry delay.
pub const RETRY_MAX_DELAY_SECS: f64 = 300.0;
/// Multiplier applied to the delay on each successive attempt.
pub const RETRY_EXPONENTIAL_BASE: f64 = 2.0;
/// Fraction of the delay drawn as uniform random jitter.
pub const RETRY_JITTER_FRACTION: f64 = 0.3;

// Circuit breaker
/// Consecutive failures before the circuit opens.
pub const CIRCUIT_BREAKER_THRESHOLD: u32 = 10;
/// How recent the last failure must be for the open circuit to keep rejecting.
pub const CIRCUIT_BREAKER_COOLDOWN: Duration = Duration::from_secs(300);

// HTTP
/// Per-request timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 60;
/// Header carrying the API credential.
pub const HEADER_API_KEY: &str = "X-Riot-Token";
/// Status code signalling rate-limit overload.
pub const HTTP_STATUS_TOO_MANY_REQUESTS: u16 = 429;
/// Default User-Agent for API requests.
pub const DEFAULT_USER_AGENT: &str = concat!("match_collector/", env!("CARGO_PKG_VERSION"));
/// Default regional API host.
pub const DEFAULT_BASE_URL: &str = "https://americas.api.riotgames.com";

// Collection
/// Reference-listing page size. A page shorter than this signals exhaustion.
pub const DEFAULT_PAGE_SIZE: usize = 100;
/// Concurrent fetch workers during the unique-fetch phase.
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;
/// Fetches between periodic checkpoint saves.
pub const CHECKPOINT_INTERVAL: usize = 500;
/// Default checkpoint file location.
pub const DEFAULT_CHECKPOINT_PATH: &str = "./collection_checkpoint.json";
/// Seconds between progress log lines during the fetch phase.
pub const LOGGING_INTERVAL_SECS: u64 = 5;
/// Owners between progress log lines during reference gathering.
pub const PHASE1_PROGRESS_EVERY: usize = 50;
/// Fetched resources between progress log lines during the unique-fetch phase.
pub const PHASE2_PROGRESS_EVERY: usize = 25;
/// Per-kind cap on resource/owner ID samples in the reported error summary.
pub const LEDGER_SAMPLE_CAP: usize = 100;
/// Cap on stored message text for uncategorized errors.
pub const LEDGER_MESSAGE_CAP: usize = 200;

// Payload plausibility checks
/// Expected participant count in a complete match payload.
pub const EXPECTED_PARTICIPANTS: usize = 8;
/// Queue IDs that legitimately produce short lobbies (practice/tutorial modes).
pub const SPECIAL_QUEUE_IDS: &[i64] = &[1220];
/// Value written into the `@type` annotation on every cached payload.
pub const ANNOTATION_TYPE: &str = "TFTMatch";

//! Dual-window rate limiter with overload-driven scaling.

use std::sync::Mutex as StdMutex;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use super::budget::RateBudget;
use super::window::RequestWindow;
use crate::config::{
    LONG_WINDOW_SAFETY_MARGIN_SECS, MIN_SLEEP_SECS, OVERLOAD_TOLERANCE, OVERLOAD_WINDOW,
    PROACTIVE_LONG_WINDOW_SLOTS, RATE_BUFFER_SECS, SCALE_FLOOR, SCALE_RECOVERY_STEP,
    SCALE_REDUCTION_STEP,
};

struct WindowState {
    window: RequestWindow,
    total_requests: u64,
    short_window_waits: u64,
    long_window_waits: u64,
}

struct ScaleState {
    scale: f64,
    recent_overloads: usize,
    epoch_start: Instant,
    total_overloads: u64,
}

/// Paces sends against a short and a long sliding window.
///
/// [`check_and_wait`](RateLimiter::check_and_wait) blocks until both windows
/// have room, then records the send. Upstream overload signals (429 responses)
/// shrink the effective budgets via [`record_overload`](RateLimiter::record_overload);
/// quiet periods let them creep back to nominal.
pub struct RateLimiter {
    state: Mutex<WindowState>,
    scale_state: StdMutex<ScaleState>,
    budget: RateBudget,
}

/// Point-in-time snapshot of limiter counters.
#[derive(Debug, Clone, Copy)]
pub struct RateLimiterStats {
    /// Sends admitted since construction.
    pub total_requests: u64,
    /// Sends currently inside the short window.
    pub requests_in_short_window: usize,
    /// Sends currently inside the long window.
    pub requests_in_long_window: usize,
    /// Times the short window forced a wait.
    pub short_window_waits: u64,
    /// Times a full long window forced a wait.
    pub long_window_waits: u64,
    /// Overload signals recorded since construction.
    pub overload_signals: u64,
    /// Current budget scale in `[0.5, 1.0]`.
    pub scale: f64,
    /// Short-window cap after scaling.
    pub effective_short_limit: usize,
    /// Long-window cap after scaling.
    pub effective_long_limit: usize,
}

impl RateLimiter {
    /// Creates a limiter enforcing `budget`.
    pub fn new(budget: RateBudget) -> Self {
        log::info!(
            "Rate limiter initialized: {} per {:?}, {} per {:?}",
            budget.short_limit,
            budget.short_window,
            budget.long_limit,
            budget.long_window
        );
        RateLimiter {
            state: Mutex::new(WindowState {
                window: RequestWindow::new(budget.long_window),
                total_requests: 0,
                short_window_waits: 0,
                long_window_waits: 0,
            }),
            scale_state: StdMutex::new(ScaleState {
                scale: 1.0,
                recent_overloads: 0,
                epoch_start: Instant::now(),
                total_overloads: 0,
            }),
            budget,
        }
    }

    /// Blocks until a send is admissible under both windows, then records it.
    ///
    /// The window lock is held across the waits, so admissions are serialized:
    /// a later caller cannot claim the slot this one is waiting for. Three
    /// checks run in order, each sleeping at most once per call:
    /// short-window cap, near-exhaustion of the long window, and a full long
    /// window (with an extra safety margin).
    pub async fn check_and_wait(&self) {
        let (effective_short, effective_long) = self.effective_limits();
        let mut state = self.state.lock().await;

        let mut now = Instant::now();
        state.window.prune(now);

        let short_count = state.window.count_within(now, self.budget.short_window);
        if short_count >= effective_short {
            if let Some(oldest) = state.window.oldest_within(now, self.budget.short_window) {
                let age = now.duration_since(oldest).as_secs_f64();
                let sleep_secs =
                    (self.budget.short_window.as_secs_f64() - age + RATE_BUFFER_SECS)
                        .max(MIN_SLEEP_SECS);
                log::debug!(
                    "Short-window budget reached ({short_count}/{effective_short}), \
                     sleeping {sleep_secs:.2}s"
                );
                state.short_window_waits += 1;
                sleep(Duration::from_secs_f64(sleep_secs)).await;
                now = Instant::now();
                state.window.prune(now);
            }
        }

        // Wait early when the long window is nearly spent, before the hard cap
        // below would impose its safety margin.
        let len = state.window.len();
        let available = effective_long as i64 - len as i64;
        if available < PROACTIVE_LONG_WINDOW_SLOTS as i64 && len > 0 {
            let slots_to_free = PROACTIVE_LONG_WINDOW_SLOTS as i64 - available;
            let target = if slots_to_free > 0 && (slots_to_free as usize) < len {
                state.window.get(slots_to_free as usize)
            } else {
                state.window.oldest()
            };
            if let Some(target) = target {
                let age = now.duration_since(target).as_secs_f64();
                let sleep_secs = (self.budget.long_window.as_secs_f64() - age + RATE_BUFFER_SECS)
                    .max(MIN_SLEEP_SECS);
                log::debug!(
                    "Long-window budget nearly spent ({len}/{effective_long}, \
                     {available} slots free), sleeping {sleep_secs:.2}s"
                );
                sleep(Duration::from_secs_f64(sleep_secs)).await;
                now = Instant::now();
                state.window.prune(now);
            }
        }

        let len = state.window.len();
        if len >= effective_long {
            if let Some(oldest) = state.window.oldest() {
                let age = now.duration_since(oldest).as_secs_f64();
                let sleep_secs = (self.budget.long_window.as_secs_f64() - age
                    + RATE_BUFFER_SECS
                    + LONG_WINDOW_SAFETY_MARGIN_SECS)
                    .max(MIN_SLEEP_SECS);
                log::info!(
                    "Long-window budget exhausted ({len}/{effective_long}), \
                     sleeping {sleep_secs:.2}s"
                );
                state.long_window_waits += 1;
                sleep(Duration::from_secs_f64(sleep_secs)).await;
                now = Instant::now();
                state.window.prune(now);
            }
        }

        let now = Instant::now();
        state.window.push(now);
        state.total_requests += 1;
    }

    /// Records an upstream overload signal (a 429 response).
    ///
    /// More than [`OVERLOAD_TOLERANCE`] signals inside one epoch shrink the
    /// budget scale by a step per excess signal, floored at [`SCALE_FLOOR`].
    /// A signal landing while the count is back under tolerance nudges the
    /// scale a small step toward nominal instead.
    pub fn record_overload(&self) {
        let mut scale_state = self.scale_state.lock().expect("scale lock poisoned");
        let now = Instant::now();
        scale_state.total_overloads += 1;
        scale_state.recent_overloads += 1;

        if now.duration_since(scale_state.epoch_start) > OVERLOAD_WINDOW {
            scale_state.recent_overloads = 1;
            scale_state.epoch_start = now;
        }

        if scale_state.recent_overloads > OVERLOAD_TOLERANCE {
            let excess = (scale_state.recent_overloads - OVERLOAD_TOLERANCE) as f64;
            let reduction = (excess * SCALE_REDUCTION_STEP).min(1.0 - SCALE_FLOOR);
            scale_state.scale = (1.0 - reduction).max(SCALE_FLOOR);
            log::warn!(
                "Request budget scaled to {:.2}x after {} overload signals in the current epoch",
                scale_state.scale,
                scale_state.recent_overloads
            );
        } else if scale_state.scale < 1.0 {
            scale_state.scale = (scale_state.scale + SCALE_RECOVERY_STEP).min(1.0);
            log::info!(
                "Request budget scale recovering to {:.2}x",
                scale_state.scale
            );
        }
    }

    /// Current budget scale in `[0.5, 1.0]`.
    pub fn scale(&self) -> f64 {
        self.scale_state.lock().expect("scale lock poisoned").scale
    }

    /// Window caps after applying the current scale (truncated, not rounded).
    pub fn effective_limits(&self) -> (usize, usize) {
        let scale = self.scale();
        (
            (self.budget.short_limit as f64 * scale) as usize,
            (self.budget.long_limit as f64 * scale) as usize,
        )
    }

    /// Snapshot of the limiter counters, or `None` while an admission wait
    /// holds the window lock.
    pub fn stats(&self) -> Option<RateLimiterStats> {
        let state = self.state.try_lock().ok()?;
        let (effective_short, effective_long) = self.effective_limits();
        let scale_state = self.scale_state.lock().expect("scale lock poisoned");
        let now = Instant::now();
        Some(RateLimiterStats {
            total_requests: state.total_requests,
            requests_in_short_window: state.window.count_within(now, self.budget.short_window),
            requests_in_long_window: state.window.count_within(now, self.budget.long_window),
            short_window_waits: state.short_window_waits,
            long_window_waits: state.long_window_waits,
            overload_signals: scale_state.total_overloads,
            scale: scale_state.scale,
            effective_short_limit: effective_short,
            effective_long_limit: effective_long,
        })
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        RateLimiter::new(RateBudget::default())
    }
}

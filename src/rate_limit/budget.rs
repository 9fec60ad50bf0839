//! Request budgets for the dual-window rate limiter.

use std::time::Duration;

use crate::config::{
    LONG_WINDOW, MAX_REQUESTS_PER_SECOND, MAX_REQUESTS_PER_TWO_MINUTES, RatePreset, SHORT_WINDOW,
};

/// Caps on how many sends the limiter admits per window.
///
/// The short window smooths bursts, the long window enforces the sustained
/// budget. Both caps are nominal values; the limiter scales them down while
/// the upstream service is signalling overload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateBudget {
    /// Sends allowed per short window.
    pub short_limit: usize,
    /// Sends allowed per long window.
    pub long_limit: usize,
    /// Span of the short window.
    pub short_window: Duration,
    /// Span of the long window.
    pub long_window: Duration,
}

impl RateBudget {
    /// Creates a budget with the standard window spans.
    pub fn new(short_limit: usize, long_limit: usize) -> Self {
        RateBudget {
            short_limit,
            long_limit,
            short_window: SHORT_WINDOW,
            long_window: LONG_WINDOW,
        }
    }

    /// Budget matching a named credential tier.
    pub fn for_preset(preset: RatePreset) -> Self {
        match preset {
            RatePreset::Personal => RateBudget::new(20, 100),
            RatePreset::Production => RateBudget::new(3000, 180_000),
            RatePreset::Development => RateBudget::new(10, 50),
        }
    }
}

impl Default for RateBudget {
    fn default() -> Self {
        RateBudget::new(MAX_REQUESTS_PER_SECOND, MAX_REQUESTS_PER_TWO_MINUTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_personal_tier() {
        let budget = RateBudget::default();
        assert_eq!(budget, RateBudget::for_preset(RatePreset::Personal));
        assert_eq!(budget.short_limit, 20);
        assert_eq!(budget.long_limit, 100);
    }

    #[test]
    fn test_preset_budgets() {
        let production = RateBudget::for_preset(RatePreset::Production);
        assert_eq!(production.short_limit, 3000);
        assert_eq!(production.long_limit, 180_000);

        let development = RateBudget::for_preset(RatePreset::Development);
        assert_eq!(development.short_limit, 10);
        assert_eq!(development.long_limit, 50);
    }

    #[test]
    fn test_window_spans() {
        let budget = RateBudget::default();
        assert_eq!(budget.short_window, Duration::from_secs(1));
        assert_eq!(budget.long_window, Duration::from_secs(120));
    }
}

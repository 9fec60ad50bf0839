//! Dual-window request pacing with overload-driven budget scaling.
//!
//! This module keeps outbound request volume inside the upstream service's
//! published budgets:
//! - A short window smooths bursts (default 20 sends per second)
//! - A long window enforces the sustained budget (default 100 per 2 minutes)
//! - Repeated 429 responses scale both budgets down, to half at worst
//! - Quiet periods let the scale recover step by step back to nominal
//!
//! Waiting happens before a send is recorded, so a well-behaved caller never
//! exceeds either window.

mod budget;
mod limiter;
mod window;

// Re-export public API
pub use budget::RateBudget;
pub use limiter::{RateLimiter, RateLimiterStats};

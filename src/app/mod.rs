//! Main application modules.
//!
//! This module provides utilities for progress logging, shutdown handling,
//! and statistics printing used by the main application.

pub mod logging;
pub mod shutdown;
pub mod statistics;

// Re-export public API
pub use logging::log_progress;
pub use shutdown::shutdown_gracefully;
pub use statistics::{print_error_summary, print_final_statistics};

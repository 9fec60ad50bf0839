//! Configuration types and CLI options.
//!
//! This module defines enums and structs used for command-line argument parsing
//! and configuration.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::constants::{
    CHECKPOINT_INTERVAL, DEFAULT_BASE_URL, DEFAULT_CHECKPOINT_PATH, DEFAULT_MAX_CONCURRENCY,
    DEFAULT_PAGE_SIZE, DEFAULT_USER_AGENT, REQUEST_TIMEOUT_SECS, RETRY_MAX_ATTEMPTS,
};

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// Controls how log messages are formatted:
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// API key tier, which determines the request budgets and retry pacing.
///
/// The remote service issues credentials at different rate-limit tiers; the
/// preset selects matching window budgets and retry delays.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum RatePreset {
    /// Personal key: 20 requests/s, 100 requests/2min
    Personal,
    /// Production key: 3000 requests/s, 180000 requests/2min
    Production,
    /// Development key: 10 requests/s, 50 requests/2min
    Development,
}

/// Collector configuration.
///
/// Doubles as the CLI surface for the binary (via `clap`) and the programmatic
/// configuration for library callers, who can start from [`Config::default`]
/// and override fields.
///
/// # Examples
///
/// ```no_run
/// use match_collector::Config;
/// use std::path::PathBuf;
///
/// let config = Config {
///     players_file: PathBuf::from("players.txt"),
///     api_key: "RGAPI-...".into(),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Parser)]
#[command(
    name = "match_collector",
    about = "Collects match records for a set of players, fetching each unique match once."
)]
pub struct Config {
    /// File with one player ID per line (lines starting with '#' are skipped)
    #[arg(value_parser)]
    pub players_file: PathBuf,

    /// API key for the match service
    #[arg(long, env = "RIOT_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Base URL of the regional API host
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// API key tier: personal|production|development
    #[arg(long, value_enum, default_value_t = RatePreset::Personal)]
    pub rate_preset: RatePreset,

    /// Log level: error|warn|info|debug|trace
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Log format: plain|json
    #[arg(long, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Where the final collection result is written as JSON
    #[arg(long, value_parser, default_value = "./collection_result.json")]
    pub output: PathBuf,

    /// Checkpoint file for resumable collection
    #[arg(long, value_parser, default_value = DEFAULT_CHECKPOINT_PATH)]
    pub checkpoint_path: PathBuf,

    /// Fetches between periodic checkpoint saves
    #[arg(long, default_value_t = CHECKPOINT_INTERVAL)]
    pub checkpoint_interval: usize,

    /// Match-ID page size when listing a player's matches
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,

    /// Only list matches played within the last N days (omit for no time filter)
    #[arg(long)]
    pub time_window_days: Option<i64>,

    /// Total attempts per match before recording the failure
    #[arg(long, default_value_t = RETRY_MAX_ATTEMPTS)]
    pub max_attempts: usize,

    /// Concurrent fetch workers during the unique-fetch phase
    ///
    /// The request budget is global, so concurrency above the per-second
    /// budget only adds queueing. 1 reproduces strictly sequential collection.
    #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENCY)]
    pub max_concurrency: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = REQUEST_TIMEOUT_SECS)]
    pub timeout_seconds: u64,

    /// HTTP User-Agent header value
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            players_file: PathBuf::from("players.txt"),
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            rate_preset: RatePreset::Personal,
            log_level: LogLevel::Info,
            log_format: LogFormat::Plain,
            output: PathBuf::from("./collection_result.json"),
            checkpoint_path: PathBuf::from(DEFAULT_CHECKPOINT_PATH),
            checkpoint_interval: CHECKPOINT_INTERVAL,
            page_size: DEFAULT_PAGE_SIZE,
            time_window_days: None,
            max_attempts: RETRY_MAX_ATTEMPTS,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            timeout_seconds: REQUEST_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(
            log::LevelFilter::from(LogLevel::Error),
            log::LevelFilter::Error
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Warn),
            log::LevelFilter::Warn
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Info),
            log::LevelFilter::Info
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Debug),
            log::LevelFilter::Debug
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Trace),
            log::LevelFilter::Trace
        );
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.checkpoint_interval, CHECKPOINT_INTERVAL);
        assert_eq!(config.max_attempts, RETRY_MAX_ATTEMPTS);
        assert_eq!(config.max_concurrency, DEFAULT_MAX_CONCURRENCY);
        assert_eq!(config.rate_preset, RatePreset::Personal);
        assert!(config.time_window_days.is_none());
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_cli_parsing_minimal() {
        let config = Config::try_parse_from([
            "match_collector",
            "players.txt",
            "--api-key",
            "RGAPI-test",
        ])
        .expect("minimal CLI should parse");
        assert_eq!(config.players_file, PathBuf::from("players.txt"));
        assert_eq!(config.api_key, "RGAPI-test");
    }

    #[test]
    fn test_cli_parsing_preset() {
        let config = Config::try_parse_from([
            "match_collector",
            "players.txt",
            "--api-key",
            "RGAPI-test",
            "--rate-preset",
            "development",
            "--time-window-days",
            "7",
        ])
        .expect("CLI with preset should parse");
        assert_eq!(config.rate_preset, RatePreset::Development);
        assert_eq!(config.time_window_days, Some(7));
    }
}

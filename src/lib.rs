//! match_collector library: deduplicated match collection
//!
//! This library collects the match history for a set of players while fetching
//! each unique match exactly once, no matter how many players share it. Runs
//! are rate limited against the service's published budgets, retried with
//! backoff, and checkpointed so an interrupted collection resumes where it
//! left off.
//!
//! # Example
//!
//! ```no_run
//! use match_collector::{run_collection, Config};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config {
//!     players_file: std::path::PathBuf::from("players.txt"),
//!     api_key: "RGAPI-...".into(),
//!     ..Default::default()
//! };
//!
//! let result = run_collection(config).await?;
//! println!(
//!     "Collected {} unique matches for {} players",
//!     result.stats.unique_resources, result.stats.owners_processed
//! );
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Use `#[tokio::main]` in your
//! application or ensure you're calling library functions within an async
//! context.

#![warn(missing_docs)]

mod app;
pub mod checkpoint;
pub mod circuit_breaker;
pub mod client;
pub mod collector;
pub mod config;
pub mod error_handling;
pub mod initialization;
pub mod rate_limit;

// Re-export public API
pub use collector::{CollectionResult, CollectionStats};
pub use config::{Config, LogFormat, LogLevel, RatePreset};
pub use run::run_collection;

// Internal run module (contains the main collection logic)
mod run {
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::Arc;

    use anyhow::{bail, Context, Result};
    use log::{info, warn};
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio_util::sync::CancellationToken;

    use crate::app::{
        log_progress, print_error_summary, print_final_statistics, shutdown_gracefully,
    };
    use crate::checkpoint::CheckpointStore;
    use crate::circuit_breaker::CircuitBreaker;
    use crate::client::{ApiClient, RetryPolicy, RetryingRequester, TimeWindow};
    use crate::collector::{CollectionResult, CollectorOptions, DedupCollector};
    use crate::config::{Config, LOGGING_INTERVAL_SECS};
    use crate::initialization::init_client;
    use crate::rate_limit::{RateBudget, RateLimiter};

    /// Runs a collection with the provided configuration.
    ///
    /// This is the main entry point for the library. It reads player IDs from
    /// the input file, gathers each player's match references, fetches every
    /// unique match once, and returns the assembled result.
    ///
    /// # Arguments
    ///
    /// * `config` - Configuration for the run (players file, API key, rate
    ///   tier, checkpoint path, etc.)
    ///
    /// # Returns
    ///
    /// Returns a [`CollectionResult`] with the per-player match associations,
    /// the fetched match records, run statistics, and the error summary.
    /// Per-match failures do not fail the run; they appear in the result's
    /// error summary instead.
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// - The players file cannot be opened or contains no IDs
    /// - The HTTP client cannot be initialized (missing or malformed API key)
    /// - The run ends early: rejected credentials, an open circuit breaker,
    ///   or an interrupt. Each of these leaves a checkpoint for a later
    ///   resume.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use match_collector::{run_collection, Config};
    /// use std::path::PathBuf;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = Config {
    ///     players_file: PathBuf::from("players.txt"),
    ///     api_key: "RGAPI-...".into(),
    ///     ..Default::default()
    /// };
    /// let result = run_collection(config).await?;
    /// println!("Collected {} unique matches", result.stats.unique_resources);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run_collection(config: Config) -> Result<CollectionResult> {
        let owners = read_owner_ids(&config.players_file).await?;
        if owners.is_empty() {
            bail!(
                "No player IDs found in {}",
                config.players_file.display()
            );
        }
        info!("Total players in file: {}", owners.len());

        let client = init_client(&config).context("Failed to initialize HTTP client")?;

        let limiter = Arc::new(RateLimiter::new(RateBudget::for_preset(config.rate_preset)));
        let breaker = Arc::new(CircuitBreaker::new());
        let mut policy = RetryPolicy::for_preset(config.rate_preset);
        policy.max_attempts = config.max_attempts;
        let requester = RetryingRequester::new(
            client.as_ref().clone(),
            Arc::clone(&limiter),
            Arc::clone(&breaker),
            policy,
        );
        let api = Arc::new(ApiClient::new(requester, config.base_url.clone()));

        let store = CheckpointStore::new(&config.checkpoint_path);
        let options = CollectorOptions {
            page_size: config.page_size,
            time_window: config.time_window_days.map(TimeWindow::last_days),
            checkpoint_interval: config.checkpoint_interval,
            max_concurrency: config.max_concurrency,
        };

        let shutdown = CancellationToken::new();
        let interrupt = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, saving checkpoint before stopping...");
                interrupt.cancel();
            }
        });

        let start_time = std::time::Instant::now();

        let cancel = CancellationToken::new();
        let cancel_logging = cancel.child_token();
        let limiter_for_logging = Arc::clone(&limiter);
        let breaker_for_logging = Arc::clone(&breaker);
        let logging_task = Some(tokio::task::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(LOGGING_INTERVAL_SECS));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        log_progress(start_time, &limiter_for_logging, &breaker_for_logging);
                    }
                    _ = cancel_logging.cancelled() => {
                        break;
                    }
                }
            }
        }));

        let collector =
            DedupCollector::new(Arc::clone(&api), api, store, options).with_shutdown(shutdown);
        let ledger = collector.error_ledger();
        let outcome = collector.run(&owners).await;

        shutdown_gracefully(cancel, logging_task).await;

        log_progress(start_time, &limiter, &breaker);

        match outcome {
            Ok(result) => {
                print_final_statistics(&result.stats, &result.errors);
                Ok(result)
            }
            Err(e) => {
                print_error_summary(&ledger.report());
                Err(e).context("Collection run did not complete")
            }
        }
    }

    /// Reads owner IDs from `path`, one per line.
    ///
    /// Blank lines and lines starting with `#` are skipped. Duplicate IDs are
    /// dropped so a player listed twice is only processed once.
    async fn read_owner_ids(path: &Path) -> Result<Vec<String>> {
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("Failed to open players file {}", path.display()))?;
        let mut lines = BufReader::new(file).lines();

        let mut owners = Vec::new();
        let mut seen = HashSet::new();
        while let Some(line) = lines
            .next_line()
            .await
            .context("Failed to read players file")?
        {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if seen.insert(trimmed.to_string()) {
                owners.push(trimmed.to_string());
            }
        }
        Ok(owners)
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use std::io::Write;

        #[tokio::test]
        async fn test_read_owner_ids_skips_comments_and_blanks() {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            writeln!(file, "# roster").unwrap();
            writeln!(file, "player-a").unwrap();
            writeln!(file).unwrap();
            writeln!(file, "  player-b  ").unwrap();
            file.flush().unwrap();

            let owners = read_owner_ids(file.path()).await.unwrap();
            assert_eq!(owners, vec!["player-a", "player-b"]);
        }

        #[tokio::test]
        async fn test_read_owner_ids_drops_duplicates() {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            writeln!(file, "player-a").unwrap();
            writeln!(file, "player-b").unwrap();
            writeln!(file, "player-a").unwrap();
            file.flush().unwrap();

            let owners = read_owner_ids(file.path()).await.unwrap();
            assert_eq!(owners, vec!["player-a", "player-b"]);
        }

        #[tokio::test]
        async fn test_read_owner_ids_missing_file() {
            let result = read_owner_ids(Path::new("/nonexistent/players.txt")).await;
            assert!(result.is_err());
        }
    }
}

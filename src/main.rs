//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `match_collector` library that handles:
//! - Command-line argument parsing
//! - Environment variable loading (.env file)
//! - Logger initialization
//! - Writing the collection result to disk
//!
//! All core functionality is implemented in the library crate.

use anyhow::{Context, Result};
use clap::Parser;
use std::process;

use match_collector::initialization::init_logger_with;
use match_collector::{run_collection, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file (if it exists)
    // This allows setting RIOT_API_KEY in .env without exporting it manually
    // Try loading from current directory first, then from the executable's directory
    if dotenvy::dotenv().is_err() {
        // If .env not found in current dir, try next to the executable
        if let Ok(exe_path) = std::env::current_exe() {
            if let Some(exe_dir) = exe_path.parent() {
                let env_path = exe_dir.join(".env");
                if env_path.exists() {
                    let _ = dotenvy::from_path(&env_path);
                }
            }
        }
    }

    // Parse command-line arguments into Config
    let config = Config::parse();

    // Initialize logger based on config
    let log_level = config.log_level.clone();
    let log_format = config.log_format.clone();
    init_logger_with(log_level.into(), log_format).context("Failed to initialize logger")?;

    let output_path = config.output.clone();

    // Run the collection using the library
    match run_collection(config).await {
        Ok(result) => {
            let body = serde_json::to_string_pretty(&result)
                .context("Failed to serialize collection result")?;
            tokio::fs::write(&output_path, body)
                .await
                .with_context(|| format!("Failed to write {}", output_path.display()))?;

            // Print user-friendly summary
            println!(
                "✅ Collected {} unique match{} for {} player{} ({} failed) in {:.1}s",
                result.stats.unique_resources,
                if result.stats.unique_resources == 1 {
                    ""
                } else {
                    "es"
                },
                result.stats.owners_processed,
                if result.stats.owners_processed == 1 {
                    ""
                } else {
                    "s"
                },
                result.errors.failed_resource_ids.len(),
                result.stats.collection_time_seconds
            );
            println!("Results saved in {}", output_path.display());
            Ok(())
        }
        Err(e) => {
            eprintln!("match_collector error: {:#}", e);
            process::exit(1);
        }
    }
}

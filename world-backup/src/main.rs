//! World Backup - Main entry point
//!
//! Runs one backup rotation and exits. Scheduling is left to cron or a
//! systemd timer.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use world_backup::transfer::progress::format_bytes;
use world_backup::{executor, utils, Config};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "world-backup.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::from_file(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    tracing::info!(
        "Starting world-backup v{} (world: {})",
        env!("CARGO_PKG_VERSION"),
        config.world.name
    );

    let result = match executor::run(&config).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("Backup failed: {}", e);
            return Err(e.into());
        }
    };

    tracing::info!(
        "Backup of {} finished: {} uploaded as {} (previous: {}, current: {})",
        config.world.name,
        format_bytes(result.archive_bytes),
        result.uploaded.name,
        describe(result.demoted.as_ref()),
        describe(result.relabeled.as_ref())
    );

    if !result.local_removed {
        tracing::warn!("Local archive could not be removed");
    }

    Ok(())
}

fn describe(outcome: Option<&world_backup::rotation::RotationOutcome>) -> String {
    match outcome {
        Some(outcome) => outcome.to_string(),
        None => "failed".to_string(),
    }
}

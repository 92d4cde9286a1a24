use anyhow::{Context, Result};
use clap::Parser;
use gatewatch_import::{import_log, AccessStore, Config};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "gatewatch-import",
    about = "Import the gatewatch access log into SQLite (safe to re-run)"
)]
struct Args {
    /// Access log to import (overrides GATEWATCH_LOG_PATH)
    #[arg(long)]
    log: Option<PathBuf>,
    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    // A missing .env is normal; real environment variables still apply.
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = Config::from_env().context("importer configuration")?;
    if let Some(log) = args.log {
        config.log_path = log;
    }

    tracing::info!(
        log = %config.log_path.display(),
        timezone = %config.timezone,
        "gatewatch-import starting"
    );

    let mut store = AccessStore::open(&config.database).context("opening access store")?;
    let result = import_log(&config.log_path, &mut store, config.timezone)
        .with_context(|| format!("importing {}", config.log_path.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "read {} rows, {} valid, {} skipped, {} held, {} inserted (duplicates ignored)",
            result.rows_read,
            result.rows_validated,
            result.rows_skipped,
            result.rows_held,
            result.rows_inserted
        );
    }

    Ok(())
}

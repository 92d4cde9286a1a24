use anyhow::{bail, Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use gatewatch_core::{AccessEvent, EventLog, Sampler};
use gatewatch_import::{import_log, AccessStore};
use serde::Serialize;
use std::io::BufReader;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod feed;

#[derive(Parser)]
#[command(name = "gatewatch", about = "gatewatch access-control pipeline")]
struct Cli {
    /// TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Access log path (overrides config and GATEWATCH_LOG_PATH)
    #[arg(long, global = true)]
    log: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a fresh session over a captured feed (JSON Lines)
    Replay {
        /// Feed file, one frame per line
        feed: PathBuf,
        /// Print the final session status as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show previously recorded events, most recent first
    History {
        /// Maximum number of rows to show
        #[arg(short = 'n', long, default_value_t = 50)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Import the access log into the database (safe to re-run)
    Import {
        /// Database path (overrides config and GATEWATCH_DB)
        #[arg(long)]
        db: Option<String>,
    },
}

/// `replay --json` output: final status plus the bounded recent view.
#[derive(Serialize)]
struct ReplayReport<'a> {
    status: &'a engine::SessionStatus,
    recent: &'a [AccessEvent],
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut cfg = config::Config::load(cli.config.as_deref())?;
    if let Some(log) = cli.log {
        cfg.log_path = log;
    }
    let tz = cfg.tz()?;

    match cli.command {
        Commands::Replay { feed, json } => {
            let file = std::fs::File::open(&feed)
                .with_context(|| format!("opening feed {}", feed.display()))?;
            let frames = feed::read_frames(BufReader::new(file))?;

            let engine = engine::spawn_engine(&cfg.log_path)?;
            let started = engine.start().await?;
            tracing::info!(session = %started.session_id, frames = frames.len(), "replay started");

            let base = Utc::now().with_timezone(&tz);
            let mut sampler = Sampler::new(cfg.sample_interval());
            let mut sampled = 0usize;

            for frame in frames {
                if !sampler.ready(frame.elapsed()) {
                    continue;
                }
                let Some(at) = frame_time(base, frame.at_ms) else {
                    tracing::warn!(at_ms = frame.at_ms, "frame offset out of range; skipping");
                    continue;
                };
                sampled += 1;
                let outcome = engine.tick(frame.faces, at).await?;
                for event in &outcome.events {
                    println!(
                        "{} {}  {:<12} {:<8} #{:<4} {}",
                        event.log_date(),
                        event.log_time(),
                        event.identity_label,
                        event.status,
                        event.occurrence_count,
                        if event.first_occurrence { "first" } else { "" },
                    );
                }
                if outcome.unpersisted > 0 {
                    tracing::warn!(count = outcome.unpersisted, "events not written to the log");
                }
            }

            let status = engine.status().await?;
            if json {
                let recent = engine.recent().await?;
                let report = ReplayReport {
                    status: &status,
                    recent: &recent,
                };
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "sampled {sampled} frames, {} identities, authorized: {}, latest: {}",
                    status.identities,
                    status.authorized.as_deref().unwrap_or("none"),
                    status
                        .latest_status
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "none".into()),
                );
            }
        }
        Commands::History { limit, json } => {
            let rows = EventLog::at(&cfg.log_path).read_history()?;
            let rows: Vec<_> = rows.into_iter().take(limit).collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if rows.is_empty() {
                println!("No events recorded");
            } else {
                println!(
                    "{:<10} {:<8} {:<12} {:<8} {:<6} {}",
                    "date", "time", "identity", "status", "first", "n"
                );
                for row in rows {
                    println!(
                        "{:<10} {:<8} {:<12} {:<8} {:<6} {}",
                        row.date, row.time, row.identity, row.status, row.first_occurrence, row.occurrence
                    );
                }
            }
        }
        Commands::Import { db } => {
            let Some(database) = db.or(cfg.database) else {
                bail!("no database configured: pass --db or set GATEWATCH_DB");
            };
            let mut store = AccessStore::open(&database).context("opening access store")?;
            let result = import_log(&cfg.log_path, &mut store, tz)
                .with_context(|| format!("importing {}", cfg.log_path.display()))?;
            println!(
                "read {} rows, {} valid, {} skipped, {} held, {} inserted",
                result.rows_read,
                result.rows_validated,
                result.rows_skipped,
                result.rows_held,
                result.rows_inserted
            );
        }
    }

    Ok(())
}

/// Wall-clock time of a frame captured `at_ms` after `base`.
fn frame_time(base: DateTime<Tz>, at_ms: u64) -> Option<DateTime<Tz>> {
    let offset = TimeDelta::try_milliseconds(i64::try_from(at_ms).ok()?)?;
    base.checked_add_signed(offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::America::Sao_Paulo;

    #[test]
    fn test_frame_time_offsets_base() {
        let base = Sao_Paulo.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let at = frame_time(base, 1_500).unwrap();
        let expected = Sao_Paulo.with_ymd_and_hms(2024, 1, 1, 10, 0, 1).unwrap()
            + TimeDelta::milliseconds(500);
        assert_eq!(at, expected);
    }

    #[test]
    fn test_frame_time_rejects_out_of_range_offsets() {
        let base = Sao_Paulo.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        assert!(frame_time(base, u64::MAX).is_none());
        assert!(frame_time(base, i64::MAX as u64).is_none());
    }
}

use chrono_tz::Tz;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_LOG_PATH: &str = "access-log.csv";
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::Sao_Paulo;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} is not set (point it at the target database)")]
    Missing(&'static str),
    #[error("{key}: unknown time zone {value:?}")]
    BadTimezone { key: &'static str, value: String },
}

/// Importer configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database path or `file:` URI.
    pub database: String,
    /// Durable access log to import.
    pub log_path: PathBuf,
    /// Civil time zone the log's dates and times were written in.
    pub timezone: Tz,
}

impl Config {
    /// Load configuration from `GATEWATCH_*` environment variables.
    ///
    /// `GATEWATCH_DB` is required; the rest have defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database = lookup("GATEWATCH_DB")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("GATEWATCH_DB"))?;

        let log_path = lookup("GATEWATCH_LOG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_PATH));

        let timezone = match lookup("GATEWATCH_TIMEZONE") {
            Some(value) => parse_timezone("GATEWATCH_TIMEZONE", &value)?,
            None => DEFAULT_TIMEZONE,
        };

        Ok(Self {
            database,
            log_path,
            timezone,
        })
    }
}

pub fn parse_timezone(key: &'static str, value: &str) -> Result<Tz, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::BadTimezone {
        key,
        value: value.to_string(),
    })
}

use chrono_tz::Tz;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("unknown time zone {0:?}")]
    Timezone(String),
    #[error("GATEWATCH_SAMPLE_INTERVAL_MS must be a whole number of milliseconds, got {0:?}")]
    SampleInterval(String),
}

/// CLI configuration: optional TOML file, then `GATEWATCH_*` environment
/// overrides. Command-line flags are applied by the caller.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Durable access log the session appends to.
    pub log_path: PathBuf,
    /// Civil time zone events are recorded in.
    pub timezone: String,
    /// Minimum spacing between sampled frames.
    pub sample_interval_ms: u64,
    /// Database for `gatewatch import`.
    pub database: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from(gatewatch_import::config::DEFAULT_LOG_PATH),
            timezone: gatewatch_import::config::DEFAULT_TIMEZONE.name().to_string(),
            sample_interval_ms: gatewatch_core::sampler::DEFAULT_SAMPLE_INTERVAL.as_millis() as u64,
            database: None,
        }
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(v) = lookup("GATEWATCH_LOG_PATH") {
            self.log_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("GATEWATCH_TIMEZONE") {
            self.timezone = v;
        }
        if let Some(v) = lookup("GATEWATCH_SAMPLE_INTERVAL_MS") {
            self.sample_interval_ms = v
                .trim()
                .parse()
                .map_err(|_| ConfigError::SampleInterval(v.clone()))?;
        }
        if let Some(v) = lookup("GATEWATCH_DB") {
            self.database = Some(v);
        }
        Ok(())
    }

    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .trim()
            .parse()
            .map_err(|_| ConfigError::Timezone(self.timezone.clone()))
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.sample_interval(), Duration::from_millis(800));
        assert_eq!(cfg.tz().unwrap(), chrono_tz::America::Sao_Paulo);
        assert!(cfg.database.is_none());
    }

    #[test]
    fn test_file_with_partial_keys() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "log_path = \"/tmp/gate.csv\"").unwrap();
        writeln!(f, "sample_interval_ms = 250").unwrap();
        let cfg = Config::from_file(f.path()).unwrap();
        assert_eq!(cfg.log_path, PathBuf::from("/tmp/gate.csv"));
        assert_eq!(cfg.sample_interval_ms, 250);
        assert_eq!(cfg.timezone, "America/Sao_Paulo");
    }

    #[test]
    fn test_env_overrides_file() {
        let mut cfg = Config::default();
        cfg.apply_env(|key| match key {
            "GATEWATCH_TIMEZONE" => Some("UTC".into()),
            "GATEWATCH_SAMPLE_INTERVAL_MS" => Some(" 250 ".into()),
            "GATEWATCH_DB" => Some("events.db".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(cfg.tz().unwrap(), chrono_tz::UTC);
        assert_eq!(cfg.sample_interval_ms, 250);
        assert_eq!(cfg.database.as_deref(), Some("events.db"));
    }

    #[test]
    fn test_bad_sample_interval_is_an_error() {
        let mut cfg = Config::default();
        let err = cfg
            .apply_env(|key| (key == "GATEWATCH_SAMPLE_INTERVAL_MS").then(|| "not a number".into()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::SampleInterval(v) if v == "not a number"));
        assert_eq!(cfg.sample_interval_ms, 800);
    }

    #[test]
    fn test_bad_timezone() {
        let cfg = Config {
            timezone: "Nowhere/Special".into(),
            ..Config::default()
        };
        assert!(matches!(cfg.tz(), Err(ConfigError::Timezone(_))));
    }
}

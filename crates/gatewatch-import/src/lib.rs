//! gatewatch-import — Idempotent bulk import of the access log.
//!
//! Reads the durable CSV log written by `gatewatch-core`, normalizes each
//! row, and inserts the result into SQLite in a single transaction.
//! Re-running an import never duplicates rows.

pub mod config;
pub mod importer;
pub mod parse;
pub mod store;

pub use config::{Config, ConfigError};
pub use importer::{import_log, ImportError, ImportResult};
pub use parse::{ImportRow, ParseResult, SkipReason, StatusField};
pub use store::{AccessStore, StoreError, StoredEvent};

//! SQLite-backed access event store.
//!
//! The unique index over `(identity, event_time, status, first_occurrence)`
//! is what makes re-imports idempotent: inserts that collide with it are
//! dropped by `ON CONFLICT DO NOTHING`.

use crate::parse::ImportRow;
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, TransactionBehavior};
use std::time::Duration;
use thiserror::Error;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS access_events (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    identity         TEXT    NOT NULL,
    status           TEXT    NOT NULL CHECK (status IN ('Approved', 'Denied')),
    first_occurrence BOOLEAN,
    event_time       TEXT    NOT NULL,
    created_at       TEXT    NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);
CREATE INDEX IF NOT EXISTS idx_access_events_event_time
    ON access_events (event_time DESC);
CREATE INDEX IF NOT EXISTS idx_access_events_identity_time
    ON access_events (identity, event_time DESC);
CREATE UNIQUE INDEX IF NOT EXISTS uniq_access_events_key
    ON access_events (identity, event_time, status, first_occurrence);
";

const INSERT_SQL: &str = "
INSERT INTO access_events (identity, status, first_occurrence, event_time)
VALUES (?1, ?2, ?3, ?4)
ON CONFLICT (identity, event_time, status, first_occurrence) DO NOTHING
";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("cannot open database {database}: {source}")]
    Open {
        database: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("schema creation failed: {0}")]
    Schema(#[source] rusqlite::Error),
    #[error("batch insert failed, nothing committed: {0}")]
    Insert(#[source] rusqlite::Error),
    #[error("query failed: {0}")]
    Query(#[source] rusqlite::Error),
}

/// A row as stored, for reporting.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StoredEvent {
    pub identity: String,
    pub status: String,
    pub first_occurrence: Option<bool>,
    pub event_time: String,
}

pub struct AccessStore {
    conn: Connection,
}

impl AccessStore {
    /// Open (or create) the database and make sure the schema exists.
    pub fn open(database: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(database).map_err(|source| StoreError::Open {
            database: database.to_string(),
            source,
        })?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::Open {
            database: ":memory:".to_string(),
            source,
        })?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        // Concurrent importers wait for each other instead of failing.
        conn.busy_timeout(BUSY_TIMEOUT).map_err(StoreError::Schema)?;
        conn.execute_batch(SCHEMA).map_err(StoreError::Schema)?;
        tracing::debug!("access_events schema ready");
        Ok(Self { conn })
    }

    /// Insert all rows in one transaction. Returns how many were new.
    ///
    /// Rows already present are skipped silently. Any other failure rolls
    /// back the whole batch. The write lock is taken up front so concurrent
    /// importers queue on the busy timeout.
    pub fn insert_batch(&mut self, rows: &[ImportRow]) -> Result<usize, StoreError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StoreError::Insert)?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(INSERT_SQL).map_err(StoreError::Insert)?;
            for row in rows {
                inserted += stmt
                    .execute(params![
                        row.identity,
                        row.status.as_str(),
                        row.first_occurrence,
                        event_time_key(row),
                    ])
                    .map_err(StoreError::Insert)?;
            }
        }
        tx.commit().map_err(StoreError::Insert)?;
        Ok(inserted)
    }

    pub fn count(&self) -> Result<u64, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM access_events", [], |r| r.get(0))
            .map_err(StoreError::Query)?;
        Ok(n as u64)
    }

    /// Latest events by event time, newest first.
    pub fn latest(&self, limit: usize) -> Result<Vec<StoredEvent>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT identity, status, first_occurrence, event_time
                 FROM access_events ORDER BY event_time DESC, id DESC LIMIT ?1",
            )
            .map_err(StoreError::Query)?;
        let rows = stmt
            .query_map([limit as i64], |r| {
                Ok(StoredEvent {
                    identity: r.get(0)?,
                    status: r.get(1)?,
                    first_occurrence: r.get(2)?,
                    event_time: r.get(3)?,
                })
            })
            .map_err(StoreError::Query)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::Query)
    }
}

/// Stored form of the event time: RFC 3339 in UTC, so text order is
/// instant order whatever zone the row was recorded in.
fn event_time_key(row: &ImportRow) -> String {
    row.event_time
        .with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

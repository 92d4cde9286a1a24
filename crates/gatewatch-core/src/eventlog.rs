//! Durable append-only CSV log of access events.
//!
//! Layout: one header row, then `date, time, identity, status,
//! first-occurrence, occurrence-count` per event. Older logs carry
//! 5-column rows without the date; readers accept both.

use crate::event::AccessEvent;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DATE_FORMAT: &str = "%d/%m/%Y";
pub const TIME_FORMAT: &str = "%H:%M:%S";
pub const HEADER: [&str; 6] = ["data", "hora", "id", "status", "primeira_vez", "ocorrencia"];

const FLAG_YES: &str = "sim";
const FLAG_NO: &str = "nao";

#[derive(Error, Debug)]
pub enum EventLogError {
    #[error("event log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("event log {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// A log row split into its six logical fields, all as raw text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRow {
    pub date: String,
    pub time: String,
    pub identity: String,
    pub status: String,
    pub first_occurrence: String,
    /// Empty when the row carried no count column.
    pub occurrence: String,
}

impl LogRow {
    /// Map a raw record onto the six logical columns.
    ///
    /// Rows with 6 or more fields are taken positionally (extra fields are
    /// ignored). A 5-field row is a legacy dateless row when its first field
    /// reads as a clock time, otherwise it is a dated row missing its count.
    /// Anything shorter yields `None`.
    pub fn from_fields<S: AsRef<str>>(fields: &[S]) -> Option<Self> {
        let f = |i: usize| fields.get(i).map(|s| s.as_ref().to_string()).unwrap_or_default();
        match fields.len() {
            0..=4 => None,
            5 if looks_like_time(fields[0].as_ref()) => Some(Self {
                date: String::new(),
                time: f(0),
                identity: f(1),
                status: f(2),
                first_occurrence: f(3),
                occurrence: f(4),
            }),
            _ => Some(Self {
                date: f(0),
                time: f(1),
                identity: f(2),
                status: f(3),
                first_occurrence: f(4),
                occurrence: f(5),
            }),
        }
    }

    /// True for the header row this log writes.
    pub fn is_header<S: AsRef<str>>(fields: &[S]) -> bool {
        fields.len() >= 2
            && strip_bom(fields[0].as_ref()).trim().eq_ignore_ascii_case(HEADER[0])
            && fields[1].as_ref().trim().eq_ignore_ascii_case(HEADER[1])
    }
}

/// True when every field is empty or whitespace.
pub fn is_blank<S: AsRef<str>>(fields: &[S]) -> bool {
    fields.iter().all(|f| f.as_ref().trim().is_empty())
}

pub fn strip_bom(s: &str) -> &str {
    s.strip_prefix('\u{feff}').unwrap_or(s)
}

fn looks_like_time(s: &str) -> bool {
    let s = s.trim();
    s.contains(':') && !s.contains('/')
}

/// Handle on the durable log file. Opens the file per append, so several
/// handles (or processes) may share one path.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    /// Open the log, writing the header if the file is absent or empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, EventLogError> {
        let log = Self { path: path.into() };
        log.ensure_header()?;
        Ok(log)
    }

    /// Handle on an existing (or absent) log, for reading. Touches nothing.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_header(&self) -> Result<(), EventLogError> {
        let empty = match std::fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => return Err(self.io_err(e)),
        };
        if empty {
            let mut writer = csv::Writer::from_writer(self.open_append()?);
            writer.write_record(HEADER).map_err(|e| self.csv_err(e))?;
            writer.flush().map_err(|e| self.io_err(e))?;
            tracing::info!(path = %self.path.display(), "created event log");
        }
        Ok(())
    }

    /// Append one event as a single line. Never reads or rewrites earlier lines.
    pub fn append(&self, event: &AccessEvent) -> Result<(), EventLogError> {
        let mut writer = csv::Writer::from_writer(self.open_append()?);
        let count = event.occurrence_count.to_string();
        writer
            .write_record([
                event.log_date().as_str(),
                event.log_time().as_str(),
                event.identity_label.as_str(),
                event.status.log_text(),
                if event.first_occurrence { FLAG_YES } else { FLAG_NO },
                count.as_str(),
            ])
            .map_err(|e| self.csv_err(e))?;
        writer.flush().map_err(|e| self.io_err(e))?;
        Ok(())
    }

    /// Every recognizable row, most recent first. A missing file is an
    /// empty history.
    pub fn read_history(&self) -> Result<Vec<LogRow>, EventLogError> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_err(e)),
        };
        let mut rows = Vec::new();
        for record in snapshot_reader(file).map_err(|e| self.io_err(e))?.byte_records() {
            let record = record.map_err(|e| self.csv_err(e))?;
            let fields: Vec<String> = record
                .iter()
                .map(|f| String::from_utf8_lossy(f).into_owned())
                .collect();
            if is_blank(&fields) || LogRow::is_header(&fields) {
                continue;
            }
            // History keeps only the two shapes the recorder has ever written.
            if fields.len() != 5 && fields.len() != 6 {
                continue;
            }
            if let Some(row) = LogRow::from_fields(&fields) {
                rows.push(row);
            }
        }
        rows.reverse();
        Ok(rows)
    }

    fn open_append(&self) -> Result<File, EventLogError> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_err(e))
    }

    fn io_err(&self, source: std::io::Error) -> EventLogError {
        EventLogError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn csv_err(&self, source: csv::Error) -> EventLogError {
        EventLogError::Csv {
            path: self.path.clone(),
            source,
        }
    }
}

/// CSV reader over the complete lines in the file right now.
///
/// Bytes appended after this call are not read, and neither is a trailing
/// line without its newline: a writer may still be in the middle of it.
pub fn snapshot_reader(mut file: File) -> std::io::Result<csv::Reader<std::io::Take<File>>> {
    let len = file.metadata()?.len();
    let complete = complete_prefix_len(&mut file, len)?;
    file.rewind()?;
    Ok(csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file.take(complete)))
}

/// Length of `file[..len]` up to and including its last newline.
fn complete_prefix_len(file: &mut File, len: u64) -> std::io::Result<u64> {
    let mut buf = [0u8; 4096];
    let mut end = len;
    while end > 0 {
        let start = end.saturating_sub(buf.len() as u64);
        let chunk = &mut buf[..(end - start) as usize];
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(chunk)?;
        if let Some(i) = chunk.iter().rposition(|&b| b == b'\n') {
            return Ok(start + i as u64 + 1);
        }
        end = start;
    }
    Ok(0)
}

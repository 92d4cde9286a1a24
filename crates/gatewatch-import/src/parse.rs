//! Row normalization for the access log.
//!
//! Each non-blank data row becomes either a [`ParseResult::Valid`] tuple
//! ready for insertion or a [`ParseResult::Skipped`] with the reason.

use chrono::{DateTime, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use gatewatch_core::{AccessStatus, LogRow};
use std::fmt;

/// Tried in order; seconds are optional in older logs.
const DATETIME_FORMATS: [&str; 2] = ["%d/%m/%Y %H:%M:%S", "%d/%m/%Y %H:%M"];

const TRUTHY: [&str; 5] = ["sim", "s", "1", "true", "verdadeiro"];

/// Status column after normalization. Unrecognized text is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusField {
    Canonical(AccessStatus),
    Raw(String),
}

impl StatusField {
    pub fn parse(text: &str) -> Self {
        match AccessStatus::from_loose(text) {
            Some(status) => Self::Canonical(status),
            None => Self::Raw(text.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Canonical(status) => status.as_str(),
            Self::Raw(text) => text,
        }
    }
}

/// A normalized row, ready for the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRow {
    pub identity: String,
    pub status: StatusField,
    pub first_occurrence: bool,
    pub event_time: DateTime<Tz>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    TooFewColumns(usize),
    MissingDate,
    BadTimestamp { date: String, time: String },
    /// Local time that does not exist in the zone (DST gap).
    NonexistentLocalTime { date: String, time: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooFewColumns(n) => write!(f, "too few columns ({n}, need at least 5)"),
            Self::MissingDate => f.write_str("no date (legacy row)"),
            Self::BadTimestamp { date, time } => write!(f, "unparseable date/time '{date} {time}'"),
            Self::NonexistentLocalTime { date, time } => {
                write!(f, "'{date} {time}' does not exist in the configured zone")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseResult {
    Valid(ImportRow),
    Skipped(SkipReason),
}

/// Normalize one non-blank, non-header record.
pub fn parse_row<S: AsRef<str>>(fields: &[S], tz: Tz) -> ParseResult {
    let Some(row) = LogRow::from_fields(fields) else {
        return ParseResult::Skipped(SkipReason::TooFewColumns(fields.len()));
    };

    let event_time = match parse_timestamp(&row.date, &row.time, tz) {
        Ok(t) => t,
        Err(reason) => return ParseResult::Skipped(reason),
    };

    ParseResult::Valid(ImportRow {
        identity: row.identity.trim().to_string(),
        status: StatusField::parse(&row.status),
        first_occurrence: parse_flag(&row.first_occurrence),
        event_time,
    })
}

/// One-sided: true only for a recognized truthy token.
pub fn parse_flag(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    TRUTHY.contains(&lower.as_str())
}

/// Combine `dd/mm/yyyy` and `HH:MM[:SS]` into a zoned timestamp.
pub fn parse_timestamp(date: &str, time: &str, tz: Tz) -> Result<DateTime<Tz>, SkipReason> {
    let date = date.trim();
    let time = time.trim();
    if date.is_empty() {
        return Err(SkipReason::MissingDate);
    }

    let joined = format!("{date} {time}");
    let naive = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&joined, fmt).ok())
        .ok_or_else(|| SkipReason::BadTimestamp {
            date: date.to_string(),
            time: time.to_string(),
        })?;

    // Ambiguous wall times (DST fall-back) resolve to the earlier instant.
    tz.from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| SkipReason::NonexistentLocalTime {
            date: date.to_string(),
            time: time.to_string(),
        })
}

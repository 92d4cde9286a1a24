use chrono::DateTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Outcome of an access decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessStatus {
    Approved,
    Denied,
}

impl AccessStatus {
    /// Canonical name, as stored in the relational store.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "Approved",
            Self::Denied => "Denied",
        }
    }

    /// Text written to the durable log.
    pub fn log_text(self) -> &'static str {
        match self {
            Self::Approved => "Aprovado",
            Self::Denied => "Negado",
        }
    }

    /// Case-insensitive stem match over English and log spellings.
    ///
    /// Returns `None` for anything unrecognized; callers decide whether to
    /// keep the raw text.
    pub fn from_loose(text: &str) -> Option<Self> {
        let lower = text.trim().to_lowercase();
        if lower.contains("approv") || lower.contains("aprov") {
            Some(Self::Approved)
        } else if lower.contains("den") || lower.contains("neg") {
            Some(Self::Denied)
        } else {
            None
        }
    }
}

impl std::fmt::Display for AccessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// One detected face at one sampling tick. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessEvent {
    pub timestamp: DateTime<Tz>,
    pub identity_label: String,
    pub status: AccessStatus,
    pub first_occurrence: bool,
    pub occurrence_count: u32,
}

impl AccessEvent {
    /// Local date as written to the log (`dd/mm/yyyy`).
    pub fn log_date(&self) -> String {
        self.timestamp.format(crate::eventlog::DATE_FORMAT).to_string()
    }

    /// Local time as written to the log (`HH:MM:SS`).
    pub fn log_time(&self) -> String {
        self.timestamp.format(crate::eventlog::TIME_FORMAT).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_loose_log_spellings() {
        assert_eq!(AccessStatus::from_loose("Aprovado"), Some(AccessStatus::Approved));
        assert_eq!(AccessStatus::from_loose("NEGADO"), Some(AccessStatus::Denied));
        assert_eq!(AccessStatus::from_loose(" negado "), Some(AccessStatus::Denied));
    }

    #[test]
    fn test_from_loose_english() {
        assert_eq!(AccessStatus::from_loose("APPROVED"), Some(AccessStatus::Approved));
        assert_eq!(AccessStatus::from_loose("denied"), Some(AccessStatus::Denied));
    }

    #[test]
    fn test_from_loose_unknown() {
        assert_eq!(AccessStatus::from_loose("pending"), None);
        assert_eq!(AccessStatus::from_loose(""), None);
    }
}

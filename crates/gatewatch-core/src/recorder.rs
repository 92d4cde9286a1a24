//! Event recorder: durable append plus a bounded recent-events view.

use crate::event::{AccessEvent, AccessStatus};
use crate::eventlog::{EventLog, EventLogError};
use chrono::DateTime;
use chrono_tz::Tz;
use std::collections::VecDeque;

/// Capacity of the most-recent-first view.
pub const RECENT_CAPACITY: usize = 18;

/// Result of recording one event.
#[derive(Debug)]
pub struct Recorded {
    pub event: AccessEvent,
    /// Set when the durable append failed. The event is still in the
    /// recent view.
    pub persist_error: Option<EventLogError>,
}

impl Recorded {
    pub fn persisted(&self) -> bool {
        self.persist_error.is_none()
    }
}

/// Builds events, appends each to the durable log once, and keeps a
/// non-authoritative view of the latest ones.
///
/// No deduplication happens here: recording the same moment twice writes
/// two lines. Duplicates are absorbed at import time.
#[derive(Debug)]
pub struct EventRecorder {
    log: Option<EventLog>,
    recent: VecDeque<AccessEvent>,
}

impl EventRecorder {
    pub fn new(log: EventLog) -> Self {
        Self {
            log: Some(log),
            recent: VecDeque::with_capacity(RECENT_CAPACITY),
        }
    }

    /// Recorder without a durable log; events only reach the recent view.
    pub fn in_memory() -> Self {
        Self {
            log: None,
            recent: VecDeque::with_capacity(RECENT_CAPACITY),
        }
    }

    pub fn record(
        &mut self,
        identity_label: &str,
        is_new: bool,
        status: AccessStatus,
        occurrence_count: u32,
        timestamp: DateTime<Tz>,
    ) -> Recorded {
        let event = AccessEvent {
            timestamp,
            identity_label: identity_label.to_string(),
            status,
            first_occurrence: is_new,
            occurrence_count,
        };

        let persist_error = match &self.log {
            Some(log) => log.append(&event).err(),
            None => None,
        };
        if let Some(err) = &persist_error {
            tracing::warn!(
                error = %err,
                identity = identity_label,
                "failed to persist access event; keeping it in memory only"
            );
        }

        self.recent.push_front(event.clone());
        self.recent.truncate(RECENT_CAPACITY);

        Recorded {
            event,
            persist_error,
        }
    }

    /// Latest events, most recent first.
    pub fn recent(&self) -> impl Iterator<Item = &AccessEvent> {
        self.recent.iter()
    }

    pub fn clear_recent(&mut self) {
        self.recent.clear();
    }
}

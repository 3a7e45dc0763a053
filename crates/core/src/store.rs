//! Bounded, newest-first status log for one tracked job.
//!
//! [`StatusStore`] is the only place a job's [`StatusSnapshot`] is
//! mutated.  Every entry, local or remote, goes through
//! [`StatusStore::push`], which enforces id uniqueness, the size bound,
//! and the severity precedence rules from [`Severity::next_level`].

use std::collections::VecDeque;

use serde::Serialize;

use crate::log::LogEntry;
use crate::severity::{Severity, StatusLevel};
use crate::types::Timestamp;

/// Default bound on retained log entries per job.
pub const DEFAULT_MAX_ENTRIES: usize = 100;

/// Message of the entry every store starts with.
const SEED_MESSAGE: &str = "Ready";

/// Read-only copy of a store's state, handed to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub current_message: String,
    pub current_level: StatusLevel,
    /// Newest entry first.
    pub log: Vec<LogEntry>,
}

#[derive(Debug, Clone)]
pub struct StatusStore {
    current_message: String,
    current_level: StatusLevel,
    /// Newest entry at the front.
    log: VecDeque<LogEntry>,
    max_entries: usize,
    /// Error entries pushed since the last `clear_previous` append.
    run_error_count: usize,
}

impl Default for StatusStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl StatusStore {
    /// Create a store holding a single seed entry.  A bound of zero is
    /// treated as one so the latest entry is always visible.
    pub fn new(max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        let seed = LogEntry::new(SEED_MESSAGE, Severity::Info);
        let mut log = VecDeque::with_capacity(max_entries);
        log.push_front(seed);

        Self {
            current_message: SEED_MESSAGE.to_string(),
            current_level: StatusLevel::Idle,
            log,
            max_entries,
            run_error_count: 0,
        }
    }

    /// Append a locally-originated entry.
    ///
    /// With `clear_previous` the existing log is discarded first, so a new
    /// run does not inherit entries from the previous one.
    pub fn append(
        &mut self,
        message: impl Into<String>,
        severity: Severity,
        clear_previous: bool,
    ) -> LogEntry {
        if clear_previous {
            self.log.clear();
            self.run_error_count = 0;
        }
        let entry = LogEntry::new(message, severity);
        self.push(entry.clone());
        entry
    }

    /// Insert an entry that already carries its id and timestamp.
    pub fn push(&mut self, entry: LogEntry) {
        self.current_message.clone_from(&entry.message);
        self.current_level = entry.severity.next_level(self.current_level);
        if entry.severity == Severity::Error {
            self.run_error_count += 1;
        }

        self.log.retain(|existing| existing.id != entry.id);
        self.log.push_front(entry);
        self.log.truncate(self.max_entries);
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            current_message: self.current_message.clone(),
            current_level: self.current_level,
            log: self.log.iter().cloned().collect(),
        }
    }

    /// Entries, newest first.
    pub fn log(&self) -> impl Iterator<Item = &LogEntry> {
        self.log.iter()
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    pub fn current_message(&self) -> &str {
        &self.current_message
    }

    pub fn current_level(&self) -> StatusLevel {
        self.current_level
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Latest timestamp in the log, if any.
    pub fn high_water_mark(&self) -> Option<Timestamp> {
        self.log.iter().map(|entry| entry.timestamp).max()
    }

    /// Whether an error entry was recorded since the current run began.
    ///
    /// Counted on insertion, so the answer survives eviction of the
    /// offending entry from the bounded log.
    pub fn has_errors_since_reset(&self) -> bool {
        self.run_error_count > 0
    }
}

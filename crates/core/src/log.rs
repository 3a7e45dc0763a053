use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::severity::Severity;
use crate::types::Timestamp;

/// One line of a job's human-readable activity log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Opaque identifier, unique within one store.
    pub id: String,
    pub message: String,
    pub severity: Severity,
    pub timestamp: Timestamp,
}

impl LogEntry {
    /// Create a locally-originated entry with a fresh UUID and the current time.
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            message: message.into(),
            severity,
            timestamp: Utc::now(),
        }
    }

    /// Override the timestamp (used for sync markers and tests).
    pub fn at(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }
}

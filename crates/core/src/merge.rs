//! Reconciliation of remote-reported log entries into a local log.
//!
//! The remote job service returns its whole (or recent) log on every
//! status poll.  [`reconcile`] keeps only entries newer than anything
//! already held locally, using the latest local timestamp as a
//! high-water mark.  This assumes the remote log is append-only with
//! non-decreasing timestamps from a clock roughly in step with ours.

use chrono::DateTime;
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};

use crate::log::LogEntry;
use crate::severity::Severity;
use crate::types::Timestamp;

/// Prefix of ids synthesized for remote entries that arrive without one.
pub const REMOTE_ID_PREFIX: &str = "remote";

/// Number of digest bytes folded into a synthesized id.
const ID_DIGEST_BYTES: usize = 8;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// A log line as reported by the remote `GET /status` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteLogEntry {
    /// Remote identifier.  Numeric ids are accepted and stringified.
    #[serde(default, deserialize_with = "deserialize_remote_id")]
    pub id: Option<String>,
    pub message: String,
    /// Raw severity name, e.g. `"info"` or `"stderr"`.
    #[serde(rename = "type", default = "default_remote_kind")]
    pub kind: String,
    pub timestamp: RemoteTimestamp,
}

/// Remote timestamps arrive either as RFC 3339 strings or epoch millis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemoteTimestamp {
    Millis(i64),
    Rfc3339(Timestamp),
}

impl RemoteTimestamp {
    /// Convert to a UTC instant.  `None` if the millis are out of range.
    pub fn to_utc(self) -> Option<Timestamp> {
        match self {
            RemoteTimestamp::Millis(ms) => DateTime::from_timestamp_millis(ms),
            RemoteTimestamp::Rfc3339(ts) => Some(ts),
        }
    }
}

impl From<Timestamp> for RemoteTimestamp {
    fn from(ts: Timestamp) -> Self {
        RemoteTimestamp::Rfc3339(ts)
    }
}

impl RemoteLogEntry {
    pub fn new(message: impl Into<String>, kind: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            id: None,
            message: message.into(),
            kind: kind.into(),
            timestamp: RemoteTimestamp::Rfc3339(timestamp),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Severity for this entry.  Unknown kinds fall back to raw stdout,
    /// which is recorded but never moves the aggregate level.
    pub fn severity(&self) -> Severity {
        Severity::from_remote(&self.kind).unwrap_or_else(|| {
            tracing::debug!(kind = %self.kind, "Unknown remote log type, treating as stdout");
            Severity::Stdout
        })
    }

    /// Stable key for this entry: the remote id when present, otherwise
    /// derived from the timestamp plus a digest of kind and message.
    pub fn stable_id(&self, timestamp: Timestamp) -> String {
        if let Some(id) = &self.id {
            return id.clone();
        }

        let mut hasher = Sha256::new();
        hasher.update(self.kind.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.message.as_bytes());
        let digest = hasher.finalize();
        let short: String = digest[..ID_DIGEST_BYTES]
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();

        format!(
            "{REMOTE_ID_PREFIX}:{}:{short}",
            timestamp.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
        )
    }

    fn into_log_entry(self, timestamp: Timestamp) -> LogEntry {
        LogEntry {
            id: self.stable_id(timestamp),
            severity: self.severity(),
            message: self.message,
            timestamp,
        }
    }
}

fn default_remote_kind() -> String {
    Severity::Info.as_str().to_string()
}

fn deserialize_remote_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// Message of the marker entry emitted ahead of each synced batch.
pub fn sync_marker_message(count: usize) -> String {
    format!("Received {count} new log(s)")
}

/// Select the remote entries that are newer than everything in `local`.
///
/// Returns the entries to push, oldest first, preceded by a single
/// `"Received N new log(s)"` info marker when anything was selected.  The
/// marker takes the earliest selected timestamp so it never lifts the
/// high-water mark past a remote entry.  Entries whose timestamp cannot
/// be represented are dropped.
pub fn reconcile<'a>(
    local: impl IntoIterator<Item = &'a LogEntry>,
    remote: &[RemoteLogEntry],
) -> Vec<LogEntry> {
    let high_water_mark = local
        .into_iter()
        .map(|entry| entry.timestamp)
        .max()
        .unwrap_or(DateTime::UNIX_EPOCH);

    let selected: Vec<LogEntry> = remote
        .iter()
        .filter_map(|entry| match entry.timestamp.to_utc() {
            Some(ts) => Some((entry, ts)),
            None => {
                tracing::debug!(message = %entry.message, "Dropping remote log with invalid timestamp");
                None
            }
        })
        .filter(|(_, ts)| *ts > high_water_mark)
        .map(|(entry, ts)| entry.clone().into_log_entry(ts))
        .collect();

    let Some(earliest) = selected.iter().map(|entry| entry.timestamp).min() else {
        return Vec::new();
    };

    let mut out = Vec::with_capacity(selected.len() + 1);
    out.push(LogEntry::new(sync_marker_message(selected.len()), Severity::Info).at(earliest));
    out.extend(selected);
    out
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::store::StatusStore;

    fn remote_at(message: &str, kind: &str, ts: Timestamp) -> RemoteLogEntry {
        RemoteLogEntry::new(message, kind, ts)
    }

    #[test]
    fn empty_local_accepts_whole_batch() {
        let now = Utc::now();
        let batch = vec![
            remote_at("one", "info", now),
            remote_at("two", "stdout", now + Duration::milliseconds(5)),
        ];

        let merged = reconcile(std::iter::empty(), &batch);

        let messages: Vec<&str> = merged.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["Received 2 new log(s)", "one", "two"]);
        assert_eq!(merged[0].severity, Severity::Info);
        assert_eq!(merged[0].timestamp, now);
    }

    #[test]
    fn only_entries_after_high_water_mark_are_selected() {
        let base = Utc::now() + Duration::seconds(60);
        let local = vec![LogEntry::new("local", Severity::Info).at(base)];
        let batch = vec![
            remote_at("older", "info", base - Duration::seconds(1)),
            remote_at("same instant", "info", base),
            remote_at("newer", "info", base + Duration::milliseconds(1)),
        ];

        let merged = reconcile(&local, &batch);

        let messages: Vec<&str> = merged.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["Received 1 new log(s)", "newer"]);
        assert!(merged[1..].iter().all(|e| e.timestamp > base));
    }

    #[test]
    fn nothing_new_yields_no_marker() {
        let base = Utc::now();
        let local = vec![LogEntry::new("local", Severity::Info).at(base)];
        let batch = vec![remote_at("old", "info", base - Duration::seconds(5))];

        assert!(reconcile(&local, &batch).is_empty());
        assert!(reconcile(&local, &[]).is_empty());
    }

    #[test]
    fn overlapping_batches_apply_each_entry_once() {
        let t0 = Utc::now() + Duration::seconds(60);
        let mut store = StatusStore::new(50);

        let first = vec![remote_at("a", "info", t0), remote_at("b", "info", t0 + Duration::seconds(1))];
        for entry in reconcile(store.log(), &first) {
            store.push(entry);
        }

        let second = vec![
            remote_at("a", "info", t0),
            remote_at("b", "info", t0 + Duration::seconds(1)),
            remote_at("c", "info", t0 + Duration::seconds(2)),
        ];
        let merged = reconcile(store.log(), &second);
        let messages: Vec<&str> = merged.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["Received 1 new log(s)", "c"]);
        for entry in merged {
            store.push(entry);
        }

        assert!(reconcile(store.log(), &second).is_empty());
        let count_of = |m: &str| store.log().filter(|e| e.message == m).count();
        assert_eq!(count_of("a"), 1);
        assert_eq!(count_of("b"), 1);
        assert_eq!(count_of("c"), 1);
    }

    #[test]
    fn applying_in_order_leaves_newest_remote_first() {
        let t0 = Utc::now() + Duration::seconds(60);
        let mut store = StatusStore::new(10);
        let batch = vec![
            remote_at("step 1", "info", t0),
            remote_at("step 2", "info", t0 + Duration::seconds(1)),
        ];

        for entry in reconcile(store.log(), &batch) {
            store.push(entry);
        }

        let messages: Vec<&str> = store.log().map(|e| e.message.as_str()).collect();
        assert_eq!(messages[..3], ["step 2", "step 1", "Received 2 new log(s)"]);
    }

    #[test]
    fn synthesized_id_is_stable_and_distinct() {
        let ts = Utc::now();
        let a = remote_at("step", "info", ts);
        let b = remote_at("other step", "info", ts);

        let id_a = a.stable_id(ts);
        assert_eq!(id_a, a.clone().stable_id(ts));
        assert!(id_a.starts_with("remote:"));
        assert_ne!(id_a, b.stable_id(ts));
    }

    #[test]
    fn remote_id_is_preserved() {
        let ts = Utc::now();
        let merged = reconcile(std::iter::empty(), &[remote_at("x", "info", ts).with_id("abc")]);
        assert_eq!(merged[1].id, "abc");
    }

    #[test]
    fn unknown_kind_becomes_stdout() {
        let merged = reconcile(std::iter::empty(), &[remote_at("x", "progress", Utc::now())]);
        assert_eq!(merged[1].severity, Severity::Stdout);
    }

    #[test]
    fn deserializes_string_and_millis_timestamps() {
        let json = r#"[
            {"message": "a", "type": "stderr", "timestamp": "2026-01-02T03:04:05.678Z"},
            {"id": 17, "message": "b", "timestamp": 1767323045678}
        ]"#;
        let entries: Vec<RemoteLogEntry> = serde_json::from_str(json).unwrap();

        assert_eq!(entries[0].id, None);
        assert_eq!(entries[0].severity(), Severity::Stderr);
        assert_eq!(entries[1].id.as_deref(), Some("17"));
        assert_eq!(entries[1].kind, "info");
        assert_eq!(
            entries[0].timestamp.to_utc(),
            entries[1].timestamp.to_utc()
        );
    }
}

//! Log entry severities and the aggregate status level they drive.
//!
//! [`Severity`] is the closed set of tags a [`LogEntry`](crate::LogEntry)
//! can carry.  [`StatusLevel`] is the headline state of a job, derived
//! from the entries appended so far via [`Severity::next_level`].

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Classification of a single log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Loading,
    Success,
    Error,
    /// Raw standard output forwarded from the remote job.
    Stdout,
    /// Raw standard error forwarded from the remote job.
    Stderr,
    /// Phase marker emitted by the generation workflow.
    Workflow,
    /// Phase marker emitted by the upload job.
    Upload,
}

impl Severity {
    /// Wire name used by the remote job service.
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Loading => "loading",
            Severity::Success => "success",
            Severity::Error => "error",
            Severity::Stdout => "stdout",
            Severity::Stderr => "stderr",
            Severity::Workflow => "workflow",
            Severity::Upload => "upload",
        }
    }

    /// Parse a remote `type` string.  Returns `None` for unknown kinds.
    pub fn from_remote(kind: &str) -> Option<Self> {
        match kind {
            "info" => Some(Severity::Info),
            "loading" => Some(Severity::Loading),
            "success" => Some(Severity::Success),
            "error" => Some(Severity::Error),
            "stdout" => Some(Severity::Stdout),
            "stderr" => Some(Severity::Stderr),
            "workflow" => Some(Severity::Workflow),
            "upload" => Some(Severity::Upload),
            _ => None,
        }
    }

    /// Passthrough kinds are recorded in the log but never move the
    /// aggregate [`StatusLevel`].
    pub fn is_passthrough(self) -> bool {
        matches!(
            self,
            Severity::Stdout | Severity::Stderr | Severity::Workflow | Severity::Upload
        )
    }

    /// Apply the precedence table to `current` and return the new level.
    ///
    /// | Severity                         | Effect                                   |
    /// |----------------------------------|------------------------------------------|
    /// | `loading`, `success`, `error`    | always replaces the current level        |
    /// | `info`                           | replaces unless current is loading/error |
    /// | `stdout`, `stderr`, phase marker | no change                                |
    pub fn next_level(self, current: StatusLevel) -> StatusLevel {
        match self {
            Severity::Loading => StatusLevel::Loading,
            Severity::Success => StatusLevel::Success,
            Severity::Error => StatusLevel::Error,
            Severity::Info => match current {
                StatusLevel::Loading | StatusLevel::Error => current,
                StatusLevel::Idle | StatusLevel::Info | StatusLevel::Success => StatusLevel::Info,
            },
            Severity::Stdout | Severity::Stderr | Severity::Workflow | Severity::Upload => current,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// StatusLevel
// ---------------------------------------------------------------------------

/// Aggregate state of one tracked job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    #[default]
    Idle,
    Info,
    Loading,
    Success,
    Error,
}

impl fmt::Display for StatusLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusLevel::Idle => "idle",
            StatusLevel::Info => "info",
            StatusLevel::Loading => "loading",
            StatusLevel::Success => "success",
            StatusLevel::Error => "error",
        };
        f.write_str(name)
    }
}

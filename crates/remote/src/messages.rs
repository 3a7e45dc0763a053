//! JSON bodies exchanged with the job service.

use jobwatch_core::RemoteLogEntry;
use serde::{Deserialize, Serialize};

/// Body of a successful `POST /start` or `POST /stop`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckResponse {
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of `GET /status`.
///
/// `log` may be absent, empty, or contain only entries the caller has
/// already seen; deduplication is the caller's job.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusResponse {
    pub running: bool,
    #[serde(default)]
    pub log: Vec<RemoteLogEntry>,
}

impl StatusResponse {
    pub fn running(log: Vec<RemoteLogEntry>) -> Self {
        Self { running: true, log }
    }

    pub fn stopped(log: Vec<RemoteLogEntry>) -> Self {
        Self {
            running: false,
            log,
        }
    }
}

/// Shape of an error body.  Services disagree on the field name.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorBody {
    pub(crate) fn into_message(self) -> Option<String> {
        self.message.or(self.error).filter(|m| !m.trim().is_empty())
    }
}

//! Events broadcast by a [`JobController`](crate::JobController).
//!
//! Observers that prefer push over polling the snapshot can call
//! [`JobController::subscribe`](crate::JobController::subscribe).

use jobwatch_core::{JobKind, LogEntry};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum JobEvent {
    /// An entry was added to the job's status log.
    LogAppended { job: JobKind, entry: LogEntry },

    /// The locally known `running` flag changed.
    RunningChanged { job: JobKind, running: bool },

    /// The remote reported the run as finished and polling stopped.
    Finished { job: JobKind, with_errors: bool },
}

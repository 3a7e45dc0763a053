use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::severity::Severity;

/// The kinds of remote job this client tracks.  Each kind gets its own
/// independent controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Media-generation workflow.
    Generation,
    Upload,
}

impl JobKind {
    pub const ALL: [JobKind; 2] = [JobKind::Generation, JobKind::Upload];

    /// Path segment of this job's endpoints on the job service.
    pub fn route(self) -> &'static str {
        match self {
            JobKind::Generation => "generation",
            JobKind::Upload => "upload",
        }
    }

    /// Human-facing name used in log messages.
    pub fn label(self) -> &'static str {
        match self {
            JobKind::Generation => "Generation workflow",
            JobKind::Upload => "Upload job",
        }
    }

    /// Severity used to tag the service's acknowledgement of a start.
    pub fn phase_severity(self) -> Severity {
        match self {
            JobKind::Generation => Severity::Workflow,
            JobKind::Upload => Severity::Upload,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.route())
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generation" => Ok(JobKind::Generation),
            "upload" => Ok(JobKind::Upload),
            other => Err(format!("unknown job kind '{other}' (expected generation or upload)")),
        }
    }
}

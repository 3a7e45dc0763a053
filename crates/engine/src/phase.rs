use std::fmt;

use serde::Serialize;

/// Lifecycle of one run as seen by the controller.
///
/// `Idle -> Starting -> Running -> Stopping -> Idle`.  A failed start
/// returns straight to `Idle`; a failed stop returns to `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum JobPhase {
    #[default]
    Idle,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobPhase::Idle => "idle",
            JobPhase::Starting => "starting",
            JobPhase::Running => "running",
            JobPhase::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

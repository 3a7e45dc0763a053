//! Status synchronization engine.
//!
//! A [`JobController`] owns one job kind's run state, issues start/stop
//! commands through a [`JobService`](jobwatch_remote::JobService), and
//! drives a fixed-interval poll task while the job is running.  Each
//! poll result is reconciled into the controller's
//! [`StatusStore`](jobwatch_core::StatusStore).
//!
//! [`JobTracker`] bundles one controller per [`JobKind`](jobwatch_core::JobKind).

pub mod controller;
pub mod events;
pub mod phase;
pub mod tracker;

pub use controller::{ControllerConfig, JobController, DEFAULT_POLL_INTERVAL};
pub use events::JobEvent;
pub use phase::JobPhase;
pub use tracker::JobTracker;

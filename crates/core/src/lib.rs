//! `jobwatch-core` -- pure status-tracking primitives.
//!
//! Everything in this crate is synchronous and free of I/O except the
//! settings file helpers in [`settings`].  The async controller that
//! drives these types lives in `jobwatch-engine`.

pub mod error;
pub mod job;
pub mod log;
pub mod merge;
pub mod settings;
pub mod severity;
pub mod store;
pub mod types;

pub use error::SettingsError;
pub use job::JobKind;
pub use log::LogEntry;
pub use merge::{reconcile, RemoteLogEntry, RemoteTimestamp};
pub use settings::SettingsStore;
pub use severity::{Severity, StatusLevel};
pub use store::{StatusSnapshot, StatusStore, DEFAULT_MAX_ENTRIES};
pub use types::Timestamp;

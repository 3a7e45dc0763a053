//! Client side of the remote job-execution service.
//!
//! [`JobService`] is the seam the engine talks through; [`JobServiceApi`]
//! implements it over HTTP with [`reqwest`].  Wire payloads live in
//! [`messages`].

pub mod api;
pub mod messages;
pub mod service;

pub use api::{JobServiceApi, RemoteError};
pub use messages::{AckResponse, StatusResponse};
pub use service::JobService;

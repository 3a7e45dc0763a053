use async_trait::async_trait;
use jobwatch_core::JobKind;

use crate::api::RemoteError;
use crate::messages::StatusResponse;

/// Operations the engine needs from the remote job service, per job kind.
#[async_trait]
pub trait JobService: Send + Sync {
    /// Begin a remote job.  Returns the service's acknowledgement message.
    async fn start(&self, kind: JobKind, payload: &serde_json::Value)
        -> Result<String, RemoteError>;

    /// Ask the service to cancel the current job.  Returns its confirmation.
    async fn stop(&self, kind: JobKind) -> Result<String, RemoteError>;

    /// Idempotent status read.
    async fn status(&self, kind: JobKind) -> Result<StatusResponse, RemoteError>;
}

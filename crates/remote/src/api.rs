//! REST client for the job-execution service.
//!
//! Wraps the per-job endpoints (`POST /start`, `POST /stop`,
//! `GET /status`) under `<api_url>/<job route>` using [`reqwest`].

use async_trait::async_trait;
use jobwatch_core::JobKind;
use serde::de::DeserializeOwned;

use crate::messages::{AckResponse, ErrorBody, StatusResponse};
use crate::service::JobService;

/// Fallback acknowledgement when the service replies without a message.
const DEFAULT_ACK: &str = "Request accepted";

/// HTTP client for one job service.
#[derive(Debug, Clone)]
pub struct JobServiceApi {
    client: reqwest::Client,
    api_url: String,
}

/// Errors from the job service REST layer.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a non-2xx status.
    #[error("Job service rejected the request ({status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Error detail extracted from the body.
        message: String,
    },

    /// A 2xx body that could not be decoded.
    #[error("Malformed job service response: {0}")]
    Parse(#[from] serde_json::Error),
}

impl JobServiceApi {
    /// Create a client for a job service.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8000`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create a client reusing an existing [`reqwest::Client`] (shared
    /// connection pool, custom timeouts).
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self { client, api_url }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn endpoint(&self, kind: JobKind, action: &str) -> String {
        format!("{}/{}/{}", self.api_url, kind.route(), action)
    }

    // ---- private helpers ----

    /// Decode a response: non-2xx becomes [`RemoteError::Rejected`], a
    /// 2xx body that fails to parse becomes [`RemoteError::Parse`].
    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, RemoteError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(RemoteError::Rejected {
                status: status.as_u16(),
                message: rejection_message(status, &body),
            });
        }

        Ok(serde_json::from_str(&body)?)
    }

    async fn acknowledge(response: reqwest::Response) -> Result<String, RemoteError> {
        let ack: AckResponse = Self::parse_response(response).await?;
        Ok(ack
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ACK.to_string()))
    }
}

/// Best human-readable detail for a failed response.
fn rejection_message(status: reqwest::StatusCode, body: &str) -> String {
    if let Some(message) = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(ErrorBody::into_message)
    {
        return message;
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }

    status
        .canonical_reason()
        .unwrap_or("unknown error")
        .to_string()
}

#[async_trait]
impl JobService for JobServiceApi {
    async fn start(
        &self,
        kind: JobKind,
        payload: &serde_json::Value,
    ) -> Result<String, RemoteError> {
        tracing::debug!(job = %kind, "Sending start request");
        let response = self
            .client
            .post(self.endpoint(kind, "start"))
            .json(payload)
            .send()
            .await?;

        Self::acknowledge(response).await
    }

    async fn stop(&self, kind: JobKind) -> Result<String, RemoteError> {
        tracing::debug!(job = %kind, "Sending stop request");
        let response = self
            .client
            .post(self.endpoint(kind, "stop"))
            .send()
            .await?;

        Self::acknowledge(response).await
    }

    async fn status(&self, kind: JobKind) -> Result<StatusResponse, RemoteError> {
        let response = self
            .client
            .get(self.endpoint(kind, "status"))
            .send()
            .await?;

        Self::parse_response(response).await
    }
}

//! Keptn API adapter.
//!
//! Implements the [`translator::DownstreamSender`] trait against the Keptn
//! control-plane REST API: each event is `POST`ed as a CloudEvent to
//! `<endpoint>/v1/event` with the API token in the `x-token` header, and the
//! `keptnContext` of the response is reported back as the conversation id.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP transport, timeouts, and response decoding live
//! here. The [`translator`] crate sees only [`translator::DownstreamSender`].
//! No retries are attempted; a failed send is reported to the dispatch loop,
//! which stops.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use translator::{ConversationId, Destination, DownstreamSender, OutgoingEvent, SendError};

/// Path of the event ingestion endpoint, relative to the API base URL.
pub const EVENT_PATH: &str = "v1/event";

/// Header carrying the Keptn API token.
pub const TOKEN_HEADER: &str = "x-token";

/// Errors constructing a [`KeptnApiClient`].
#[derive(Debug, Error)]
pub enum KeptnClientError {
    /// The underlying HTTP client could not be created (e.g. TLS backend).
    #[error("failed to create HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// HTTP settings for [`KeptnApiClient`].
#[derive(Debug, Clone)]
pub struct KeptnClientConfig {
    /// Upper bound on one request, connect through body.
    pub timeout: Duration,
    /// `User-Agent` header for outgoing requests.
    pub user_agent: String,
}

impl Default for KeptnClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("keptn-cdf-translator/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// `200 OK` body of `POST /v1/event`.
#[derive(Debug, Deserialize)]
struct EventContext {
    #[serde(rename = "keptnContext", default)]
    keptn_context: Option<String>,
}

/// Error body returned by the Keptn API.
#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: Option<String>,
}

/// Sends Keptn events over HTTP.
#[derive(Debug, Clone)]
pub struct KeptnApiClient {
    http: reqwest::Client,
}

impl KeptnApiClient {
    /// Creates a client with the given settings.
    pub fn new(config: KeptnClientConfig) -> Result<Self, KeptnClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl DownstreamSender for KeptnApiClient {
    async fn send(
        &self,
        event: &OutgoingEvent,
        destination: &Destination,
    ) -> Result<Option<ConversationId>, SendError> {
        let url = destination
            .endpoint()
            .join(EVENT_PATH)
            .map_err(|e| SendError::Transport(format!("invalid event URL: {e}")))?;

        tracing::debug!(%url, event_id = %event.id(), event_type = event.event_type(), "posting event to Keptn");

        let mut request = self.http.post(url).json(event);
        if !destination.token().is_empty() {
            request = request.header(TOKEN_HEADER, destination.token().expose());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SendError::Transport(format!("request timed out: {e}"))
            } else {
                SendError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SendError::Transport(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiError>(&body)
                .ok()
                .and_then(|e| e.message)
                .filter(|m| !m.is_empty())
                .unwrap_or(body);
            tracing::warn!(status = status.as_u16(), %message, "Keptn rejected event");
            return Err(SendError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        if body.trim().is_empty() {
            return Ok(None);
        }
        let context: EventContext = serde_json::from_str(&body)
            .map_err(|e| SendError::Serialization(format!("unexpected Keptn response: {e}")))?;

        Ok(context.keptn_context.and_then(ConversationId::new))
    }
}

//! CDF event source infrastructure.
//!
//! Binds an HTTP server that receives CDF CloudEvents (binary or structured
//! content mode) on `POST /events`, decodes them into
//! [`translator::IncomingEvent`]s, and hands each one to the shared
//! [`translator::Dispatcher`].
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `POST /events` | CloudEvent webhook |
//! | `GET /health` | Liveness probe |
//!
//! ## Status codes
//!
//! | Outcome | Status |
//! |---------|--------|
//! | Dispatched, or no translator for the type | `202 Accepted` |
//! | Request is not a CloudEvent | `400 Bad Request` |
//! | Outgoing event failed validation | `500 Internal Server Error` |
//! | Keptn API call failed | `502 Bad Gateway` |
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Transport details and CloudEvents decoding live here.
//! The [`translator`] crate sees only [`translator::IncomingEvent`].

pub mod cloudevent;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::net::TcpListener;
use translator::{DispatchError, DispatchOutcome, Dispatcher};

pub use cloudevent::{decode, DecodeError};

/// Errors starting or running the webhook server.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The listen address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The requested address.
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The server failed while accepting or serving connections.
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Builds the HTTP routes around a shared dispatcher.
pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/events", post(receive_event))
        .route("/health", get(health))
        .with_state(dispatcher)
}

/// CloudEvents webhook receiver bound to a TCP port.
#[derive(Debug)]
pub struct WebhookListener {
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
}

impl WebhookListener {
    /// Binds `addr`. Port `0` picks a free port; see [`Self::local_addr`].
    pub async fn bind(addr: SocketAddr, dispatcher: Arc<Dispatcher>) -> Result<Self, ListenerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ListenerError::Bind { addr, source })?;
        Ok(Self {
            listener,
            dispatcher,
        })
    }

    /// The address actually bound.
    pub fn local_addr(&self) -> Result<SocketAddr, ListenerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves requests until `shutdown` completes, then drains in-flight
    /// requests and returns.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), ListenerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Ok(addr) = self.listener.local_addr() {
            tracing::info!(%addr, "CDF webhook listener started");
        }
        axum::serve(self.listener, router(self.dispatcher))
            .with_graceful_shutdown(shutdown)
            .await?;
        tracing::info!("CDF webhook listener stopped");
        Ok(())
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn receive_event(
    State(dispatcher): State<Arc<Dispatcher>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let event = match cloudevent::decode(&headers, body) {
        Ok(event) => event,
        Err(err) => {
            tracing::warn!(error = %err, "rejected request that is not a CloudEvent");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "status": "invalid", "error": err.to_string() })),
            );
        }
    };
    tracing::info!(event_type = event.event_type(), event_id = event.id(), "received CDF event");

    match dispatcher.handle(&event).await {
        Ok(DispatchOutcome::Unhandled { event_type }) => (
            StatusCode::ACCEPTED,
            Json(json!({ "status": "unhandled", "type": event_type })),
        ),
        Ok(DispatchOutcome::Completed {
            sent,
            conversation_id,
        }) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "status": "dispatched",
                "sent": sent,
                "shkeptncontext": conversation_id,
            })),
        ),
        Err(err) => {
            let status = match &err {
                DispatchError::Build { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                DispatchError::Send { .. } => StatusCode::BAD_GATEWAY,
            };
            (
                status,
                Json(json!({
                    "status": "failed",
                    "sent": err.sent(),
                    "error": err.to_string(),
                })),
            )
        }
    }
}

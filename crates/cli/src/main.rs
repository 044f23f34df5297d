//! CDF-to-Keptn translator entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Parse configuration** — flags with environment fallbacks
//!    (`KEPTN_ENDPOINT`, `KEPTN_API_TOKEN`, ...); see [`config::Config`].
//! 2. **Wire observability** — `tracing-subscriber` with a compact or JSON
//!    layer and an optional OpenTelemetry OTLP exporter.
//! 3. **Construct infrastructure** — the [`keptn::KeptnApiClient`] sender and
//!    the route table of CDF translators, handed to one
//!    [`translator::Dispatcher`].
//! 4. **Serve** — run the CloudEvents webhook until Ctrl-C or SIGTERM.
//!
//! Configuration errors (bad endpoint URL, unbindable address) are the only
//! fatal conditions; a bad incoming event never stops the process.

mod config;
mod observability;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use keptn::KeptnApiClient;
use listener::WebhookListener;
use translator::{Dispatcher, TranslatorRegistry};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    let _telemetry = observability::init(config.log_format, config.otlp_endpoint.as_deref())?;

    let destination = config.destination()?;
    tracing::info!(
        endpoint = %destination.endpoint(),
        token_configured = !destination.token().is_empty(),
        project = %config.project,
        stage = %config.stage,
        "configuration loaded"
    );

    let sender = KeptnApiClient::new(config.client_config()).context("failed to create Keptn client")?;

    let registry = TranslatorRegistry::with_defaults(config.target());
    tracing::info!(event_types = ?registry.event_types(), "registered translators");

    let dispatcher = Arc::new(Dispatcher::new(registry, Arc::new(sender), destination));
    let listener = WebhookListener::bind(config.listen_addr, dispatcher).await?;
    listener.serve(shutdown_signal()).await?;

    Ok(())
}

/// Completes on Ctrl-C, or on SIGTERM where available.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

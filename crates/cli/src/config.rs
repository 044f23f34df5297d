//! Process configuration.
//!
//! Every setting is a command-line flag with an environment-variable
//! fallback, so the same binary runs unchanged from a shell or from a
//! Kubernetes `Deployment` that only sets `KEPTN_ENDPOINT` / `KEPTN_API_TOKEN`.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use keptn::KeptnClientConfig;
use translator::{ApiToken, Destination, KeptnTarget};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Compact human-readable lines.
    Text,
    /// One JSON object per line.
    Json,
}

/// Translates CDF CloudEvents into Keptn events.
#[derive(Debug, Clone, Parser)]
#[command(name = "keptn-cdf-translator", version, about)]
pub struct Config {
    /// Keptn API base URL.
    #[arg(long, env = "KEPTN_ENDPOINT", default_value = "http://localhost:8080/api/")]
    pub keptn_endpoint: String,

    /// Keptn API token, sent as `x-token`.
    #[arg(long, env = "KEPTN_API_TOKEN", default_value = "", hide_env_values = true)]
    pub keptn_api_token: String,

    /// Address the CloudEvents webhook listens on.
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8081")]
    pub listen_addr: SocketAddr,

    /// Keptn project every event is addressed to.
    #[arg(long, env = "KEPTN_PROJECT", default_value = "cde")]
    pub project: String,

    /// Keptn stage every event is addressed to.
    #[arg(long, env = "KEPTN_STAGE", default_value = "production")]
    pub stage: String,

    /// Timeout for one Keptn API request, in seconds.
    #[arg(long, env = "KEPTN_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Log output format.
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// OTLP gRPC endpoint for trace export; tracing stays local when unset.
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

impl Config {
    /// The Keptn API destination. An unparsable or non-HTTP endpoint is a
    /// startup error.
    pub fn destination(&self) -> anyhow::Result<Destination> {
        Destination::parse(&self.keptn_endpoint, ApiToken::new(self.keptn_api_token.clone()))
            .with_context(|| format!("invalid Keptn endpoint '{}'", self.keptn_endpoint))
    }

    pub fn target(&self) -> KeptnTarget {
        KeptnTarget {
            project: self.project.clone(),
            stage: self.stage.clone(),
        }
    }

    pub fn client_config(&self) -> KeptnClientConfig {
        KeptnClientConfig {
            timeout: Duration::from_secs(self.request_timeout_secs),
            ..KeptnClientConfig::default()
        }
    }
}

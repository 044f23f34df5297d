//! Shared value types.
//!
//! Unlike the identifiers in [`crate::identifiers`], these types carry
//! configuration or time values that participate in building and sending
//! events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::DestinationError;

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly. Serialises as RFC 3339, the CloudEvents `time` format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

// ---------------------------------------------------------------------------
// Downstream destination
// ---------------------------------------------------------------------------

/// Credential presented to the downstream API.
///
/// `Debug` and `Display` never print the secret.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct ApiToken(String);

impl ApiToken {
    /// Wraps a raw token. An empty token is allowed (unauthenticated dev setups).
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token for placing into a request header.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns `true` if no token was configured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            f.write_str("ApiToken(<empty>)")
        } else {
            f.write_str("ApiToken(<redacted>)")
        }
    }
}

/// Where outgoing events are delivered: the control-plane API base URL and
/// the credential to present.
///
/// Fixed at startup and shared read-only by every dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    endpoint: Url,
    token: ApiToken,
}

impl Destination {
    /// Creates a destination.
    ///
    /// The endpoint is normalised to end with `/` so that relative joins
    /// (e.g. `v1/event`) append to its path instead of replacing the last
    /// segment.
    pub fn new(mut endpoint: Url, token: ApiToken) -> Self {
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }
        Self { endpoint, token }
    }

    /// Parses `endpoint` and creates a destination.
    ///
    /// Fails if the URL does not parse or its scheme is not `http`/`https`.
    pub fn parse(endpoint: &str, token: ApiToken) -> Result<Self, DestinationError> {
        let url = Url::parse(endpoint)?;
        match url.scheme() {
            "http" | "https" => Ok(Self::new(url, token)),
            other => Err(DestinationError::UnsupportedScheme(other.to_string())),
        }
    }

    /// The normalised API base URL.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// The credential to present.
    pub fn token(&self) -> &ApiToken {
        &self.token
    }
}

//! Error types for building, sending, and dispatching events.
//!
//! Nothing here is process-fatal. A [`DispatchError`] stops the remaining
//! sends for one incoming event; the service keeps serving.
//!
//! Extraction misses and unknown event types are not errors at all: the
//! former degrade to absent values, the latter is reported as
//! [`crate::DispatchOutcome::Unhandled`].

use thiserror::Error;

use crate::OutgoingEventType;

// ---------------------------------------------------------------------------
// Build errors
// ---------------------------------------------------------------------------

/// An [`crate::OutgoingEventTemplate`] failed validation when finalised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// A field the downstream schema requires was empty.
    #[error("{event_type} event is missing required field '{field}'")]
    MissingField {
        /// The outgoing event being built.
        event_type: OutgoingEventType,
        /// Name of the empty field as it appears on the wire.
        field: &'static str,
    },
}

// ---------------------------------------------------------------------------
// Destination errors
// ---------------------------------------------------------------------------

/// The configured downstream endpoint cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DestinationError {
    /// The endpoint is not a valid absolute URL.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Only `http` and `https` endpoints can receive events.
    #[error("unsupported URL scheme '{0}', expected http or https")]
    UnsupportedScheme(String),
}

// ---------------------------------------------------------------------------
// Send errors
// ---------------------------------------------------------------------------

/// The downstream sender failed to deliver an event.
///
/// Dispatch only distinguishes success from failure; the variants exist for
/// logging and for the HTTP status the listener reports.
#[derive(Debug, Error)]
pub enum SendError {
    /// The request never produced an HTTP response (connect, DNS, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// The downstream API answered with a non-success status.
    #[error("downstream rejected event with status {status}: {message}")]
    Rejected {
        /// HTTP status code returned.
        status: u16,
        /// Error message from the response body, or the raw body.
        message: String,
    },

    /// The event could not be encoded or the response could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

// ---------------------------------------------------------------------------
// Dispatch errors
// ---------------------------------------------------------------------------

/// A dispatch stopped before every translated template was sent.
///
/// Events sent before the failure are not rolled back; `sent` records how
/// many went out.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Template `index` failed validation.
    #[error("failed to build outgoing event #{index} ({sent} already sent): {source}")]
    Build {
        /// Zero-based position of the failing template.
        index: usize,
        /// Number of events successfully sent before the failure.
        sent: usize,
        /// The validation failure.
        #[source]
        source: BuildError,
    },

    /// Sending event `index` failed.
    #[error("failed to send outgoing event #{index} ({sent} already sent): {source}")]
    Send {
        /// Zero-based position of the failing event.
        index: usize,
        /// Number of events successfully sent before the failure.
        sent: usize,
        /// The sender's failure.
        #[source]
        source: SendError,
    },
}

impl DispatchError {
    /// Number of events delivered before the dispatch was aborted.
    pub fn sent(&self) -> usize {
        match self {
            DispatchError::Build { sent, .. } | DispatchError::Send { sent, .. } => *sent,
        }
    }
}

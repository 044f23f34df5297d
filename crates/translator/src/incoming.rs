//! The incoming CDF event and flat attribute extraction.
//!
//! [`IncomingEvent`] is the decoded form of a CloudEvent delivered to the
//! listener. It is immutable once constructed; translators only read from it.
//!
//! Extraction never fails. A missing extension attribute, an empty payload,
//! or a payload that is not a JSON object all read as "absent" (`None`), and
//! translators substitute defaults.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::PipelineResults;

/// Incoming event types routed by the default registry (CDF sig-events v1).
pub mod event_types {
    /// An artifact was packaged (e.g. a container image was built).
    pub const ARTIFACT_PACKAGED: &str = "cd.artifact.packaged.v1";
    /// An artifact was published to a registry.
    pub const ARTIFACT_PUBLISHED: &str = "cd.artifact.published.v1";
    /// A service was deployed to an environment.
    pub const SERVICE_DEPLOYED: &str = "cd.service.deployed.v1";
}

/// CDF extension attribute names read by the translators.
pub mod extensions {
    pub const ARTIFACT_ID: &str = "artifactid";
    pub const ARTIFACT_NAME: &str = "artifactname";
    pub const ARTIFACT_VERSION: &str = "artifactversion";
    pub const SERVICE_ENV_ID: &str = "serviceenvid";
    pub const SERVICE_NAME: &str = "servicename";
    pub const SERVICE_VERSION: &str = "serviceversion";
}

/// A typed notification received from the CDF side.
///
/// `event_type` is the routing key; extension attributes are flat string
/// pairs; `payload` is the raw CloudEvent data and may embed further JSON.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IncomingEvent {
    id: String,
    source: String,
    event_type: String,
    extensions: HashMap<String, String>,
    payload: Vec<u8>,
}

impl IncomingEvent {
    /// Creates an event of the given type with no attributes and no payload.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            ..Self::default()
        }
    }

    /// Sets the CloudEvent `id`.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the CloudEvent `source`.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Adds (or replaces) an extension attribute.
    pub fn with_extension(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extensions.insert(name.into(), value.into());
        self
    }

    /// Sets the raw payload.
    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    /// The routing key.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// The CloudEvent `id`, empty if the sender omitted it.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The CloudEvent `source`, empty if the sender omitted it.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// All extension attributes.
    pub fn extensions(&self) -> &HashMap<String, String> {
        &self.extensions
    }

    /// The raw payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    // -----------------------------------------------------------------------
    // Extraction
    // -----------------------------------------------------------------------

    /// Returns a non-empty extension attribute, or `None`.
    pub fn extension(&self, name: &str) -> Option<&str> {
        self.extensions
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Parses the payload as a JSON object.
    ///
    /// Returns `None` for an empty payload, invalid JSON, or any JSON value
    /// that is not an object.
    pub fn payload_document(&self) -> Option<Map<String, Value>> {
        if self.payload.is_empty() {
            return None;
        }
        match serde_json::from_slice::<Value>(&self.payload) {
            Ok(Value::Object(map)) => Some(map),
            Ok(_) => {
                tracing::debug!(event_type = %self.event_type, "payload is not a JSON object");
                None
            }
            Err(err) => {
                tracing::debug!(event_type = %self.event_type, error = %err, "payload is not valid JSON");
                None
            }
        }
    }

    /// Returns a non-empty top-level string field of the payload document.
    pub fn payload_str(&self, key: &str) -> Option<String> {
        self.payload_document()?
            .get(key)
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
    }

    /// Decodes the pipeline-result list embedded under `key`.
    ///
    /// See [`PipelineResults::from_document`]; any failure yields an empty list.
    pub fn pipeline_results(&self, key: &str) -> PipelineResults {
        match self.payload_document() {
            Some(doc) => PipelineResults::from_document(&doc, key),
            None => PipelineResults::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_and_empty_extensions_are_absent() {
        let event = IncomingEvent::new(event_types::ARTIFACT_PACKAGED)
            .with_extension(extensions::ARTIFACT_ID, "")
            .with_extension(extensions::ARTIFACT_NAME, "podtato-head");

        assert_eq!(event.extension(extensions::ARTIFACT_NAME), Some("podtato-head"));
        assert_eq!(event.extension(extensions::ARTIFACT_ID), None);
        assert_eq!(event.extension(extensions::ARTIFACT_VERSION), None);
    }

    #[test]
    fn payload_document_tolerates_garbage() {
        assert!(IncomingEvent::new("t").payload_document().is_none());
        assert!(IncomingEvent::new("t").with_payload("not json").payload_document().is_none());
        assert!(IncomingEvent::new("t").with_payload("[1, 2]").payload_document().is_none());
        assert!(IncomingEvent::new("t").with_payload("{}").payload_document().is_some());
    }

    #[test]
    fn payload_str_reads_top_level_strings_only() {
        let event = IncomingEvent::new("t")
            .with_payload(r#"{"shkeptncontext":"ctx","triggerid":"","n":3}"#);

        assert_eq!(event.payload_str("shkeptncontext").as_deref(), Some("ctx"));
        assert_eq!(event.payload_str("triggerid"), None);
        assert_eq!(event.payload_str("n"), None);
        assert_eq!(event.payload_str("missing"), None);
    }
}

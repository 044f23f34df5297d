//! Outgoing Keptn events: templates produced by translators and the
//! finalised CloudEvents handed to the downstream sender.
//!
//! A translator cannot know the conversation or trigger identifier that a
//! previous send in the same dispatch will return, so it produces an
//! [`OutgoingEventTemplate`]. The dispatch loop fills the missing identifiers
//! and calls [`OutgoingEventTemplate::build`] right before sending.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{BuildError, ConversationId, EventId, Timestamp, TriggerId};

/// CloudEvent `source` of every event this service emits.
pub const EVENT_SOURCE: &str = "keptn-cdf-translator";

/// CloudEvents specification version.
pub const CLOUDEVENTS_SPEC_VERSION: &str = "1.0";

/// Keptn event specification version.
pub const KEPTN_SPEC_VERSION: &str = "0.2.4";

const KEPTN_TYPE_PREFIX: &str = "sh.keptn.event.";

// ---------------------------------------------------------------------------
// Event type vocabulary
// ---------------------------------------------------------------------------

/// The fixed set of event types the downstream control plane accepts from us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutgoingEventType {
    /// A delivery sequence should start for a new artifact.
    DeliveryTriggered,
    /// A deployment task has started.
    DeploymentStarted,
    /// A deployment task has finished.
    DeploymentFinished,
}

impl OutgoingEventType {
    /// The vocabulary name (`"delivery.triggered"`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            OutgoingEventType::DeliveryTriggered => "delivery.triggered",
            OutgoingEventType::DeploymentStarted => "deployment.started",
            OutgoingEventType::DeploymentFinished => "deployment.finished",
        }
    }

    /// The CloudEvent `type` sent on the wire.
    ///
    /// Sequence triggers are stage-scoped
    /// (`sh.keptn.event.production.delivery.triggered`); task events are not
    /// (`sh.keptn.event.deployment.started`).
    pub fn qualified(self, stage: &str) -> String {
        match self {
            OutgoingEventType::DeliveryTriggered => {
                format!("{KEPTN_TYPE_PREFIX}{stage}.{}", self.as_str())
            }
            OutgoingEventType::DeploymentStarted | OutgoingEventType::DeploymentFinished => {
                format!("{KEPTN_TYPE_PREFIX}{}", self.as_str())
            }
        }
    }
}

impl std::fmt::Display for OutgoingEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// Task status reported to Keptn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Succeeded,
    Errored,
    Unknown,
}

/// Task result reported to Keptn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskResult {
    Pass,
    Warning,
    Fail,
}

/// Fields common to every Keptn event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventData {
    pub project: String,
    pub stage: String,
    pub service: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
}

/// Helm-style values to apply for a new delivery.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ConfigurationChange {
    pub values: Map<String, Value>,
}

/// Payload of `delivery.triggered`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryTriggeredData {
    #[serde(flatten)]
    pub base: EventData,
    #[serde(rename = "configurationChange")]
    pub configuration_change: ConfigurationChange,
}

/// Where and how a service was deployed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentDetails {
    #[serde(rename = "deploymentstrategy")]
    pub strategy: String,
    #[serde(rename = "deploymentURIsLocal")]
    pub uris_local: Vec<String>,
    #[serde(rename = "deploymentURIsPublic")]
    pub uris_public: Vec<String>,
    #[serde(rename = "deploymentNames")]
    pub names: Vec<String>,
    #[serde(rename = "gitCommit")]
    pub git_commit: String,
}

/// Payload of `deployment.finished`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentFinishedData {
    #[serde(flatten)]
    pub base: EventData,
    pub deployment: DeploymentDetails,
}

/// Typed payload of an outgoing event. The variant determines the event type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventPayload {
    DeliveryTriggered(DeliveryTriggeredData),
    DeploymentStarted(EventData),
    DeploymentFinished(DeploymentFinishedData),
}

impl EventPayload {
    /// The event type this payload belongs to.
    pub fn event_type(&self) -> OutgoingEventType {
        match self {
            EventPayload::DeliveryTriggered(_) => OutgoingEventType::DeliveryTriggered,
            EventPayload::DeploymentStarted(_) => OutgoingEventType::DeploymentStarted,
            EventPayload::DeploymentFinished(_) => OutgoingEventType::DeploymentFinished,
        }
    }

    /// The common project/stage/service block.
    pub fn base(&self) -> &EventData {
        match self {
            EventPayload::DeliveryTriggered(d) => &d.base,
            EventPayload::DeploymentStarted(d) => d,
            EventPayload::DeploymentFinished(d) => &d.base,
        }
    }
}

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

/// A translator's output: payload plus any correlation identifiers the
/// translator found in the incoming event.
///
/// Identifiers set here take precedence over the ones propagated by the
/// dispatch loop.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEventTemplate {
    pub payload: EventPayload,
    pub conversation_id: Option<ConversationId>,
    pub trigger_id: Option<TriggerId>,
}

impl OutgoingEventTemplate {
    /// Creates a template with no correlation identifiers.
    pub fn new(payload: EventPayload) -> Self {
        Self {
            payload,
            conversation_id: None,
            trigger_id: None,
        }
    }

    /// Pre-populates the conversation identifier.
    pub fn with_conversation_id(mut self, id: ConversationId) -> Self {
        self.conversation_id = Some(id);
        self
    }

    /// Pre-populates the trigger identifier.
    pub fn with_trigger_id(mut self, id: TriggerId) -> Self {
        self.trigger_id = Some(id);
        self
    }

    /// The event type this template will produce.
    pub fn event_type(&self) -> OutgoingEventType {
        self.payload.event_type()
    }

    /// Validates the template and finalises it into a CloudEvent with a fresh
    /// id and the current time.
    pub fn build(self) -> Result<OutgoingEvent, BuildError> {
        let kind = self.event_type();
        let base = self.payload.base();
        for (field, value) in [
            ("project", &base.project),
            ("stage", &base.stage),
            ("service", &base.service),
        ] {
            if value.trim().is_empty() {
                return Err(BuildError::MissingField {
                    event_type: kind,
                    field,
                });
            }
        }
        let event_type = kind.qualified(&base.stage);

        Ok(OutgoingEvent {
            id: EventId::new_random(),
            source: EVENT_SOURCE.to_string(),
            event_type,
            specversion: CLOUDEVENTS_SPEC_VERSION,
            keptn_spec_version: KEPTN_SPEC_VERSION,
            time: Timestamp::now(),
            content_type: "application/json",
            conversation_id: self.conversation_id,
            trigger_id: self.trigger_id,
            data: self.payload,
        })
    }
}

// ---------------------------------------------------------------------------
// Finalised event
// ---------------------------------------------------------------------------

/// A fully built Keptn CloudEvent, ready to send.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutgoingEvent {
    id: EventId,
    source: String,
    #[serde(rename = "type")]
    event_type: String,
    specversion: &'static str,
    #[serde(rename = "shkeptnspecversion")]
    keptn_spec_version: &'static str,
    time: Timestamp,
    #[serde(rename = "datacontenttype")]
    content_type: &'static str,
    #[serde(rename = "shkeptncontext", skip_serializing_if = "Option::is_none")]
    conversation_id: Option<ConversationId>,
    #[serde(rename = "triggeredid", skip_serializing_if = "Option::is_none")]
    trigger_id: Option<TriggerId>,
    data: EventPayload,
}

impl OutgoingEvent {
    pub fn id(&self) -> EventId {
        self.id
    }

    /// The qualified CloudEvent `type`.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn conversation_id(&self) -> Option<&ConversationId> {
        self.conversation_id.as_ref()
    }

    pub fn trigger_id(&self) -> Option<&TriggerId> {
        self.trigger_id.as_ref()
    }

    pub fn data(&self) -> &EventPayload {
        &self.data
    }
}

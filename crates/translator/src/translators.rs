//! Translators: one per incoming CDF event type.
//!
//! Each translator is a pure mapping from an [`IncomingEvent`] to an ordered
//! list of [`OutgoingEventTemplate`]s. Translators never talk to the network;
//! the dispatch loop in [`crate::registry`] sends what they return.
//!
//! | Incoming | Outgoing |
//! |----------|----------|
//! | `cd.artifact.packaged.v1` | `delivery.triggered` |
//! | `cd.artifact.published.v1` | `deployment.started` |
//! | `cd.service.deployed.v1` | `deployment.finished` |

use serde_json::{Map, Value};

use crate::incoming::extensions;
use crate::pipeline_results::{CONTEXT_RESULT, PIPELINE_RUN_KEY, TRIGGER_ID_RESULT};
use crate::{
    ArtifactId, ConfigurationChange, ConversationId, DeliveryTriggeredData, DeploymentDetails,
    DeploymentFinishedData, EventData, EventPayload, IncomingEvent, OutgoingEventTemplate,
    ServiceName, TaskResult, TaskStatus, TriggerId,
};

/// Service name used when a `service.deployed` event does not carry one.
pub const FALLBACK_SERVICE_NAME: &str = "poc";

/// Message attached to events describing Tekton-driven work.
const TEKTON_MESSAGE: &str = "deployment handled by Tekton";

/// Payload keys carrying upstream Keptn correlation in `artifact.published`.
const PAYLOAD_CONTEXT_KEY: &str = "shkeptncontext";
const PAYLOAD_TRIGGER_ID_KEY: &str = "triggerid";

/// Maps one incoming event type to zero or more outgoing event templates.
pub trait Translator: Send + Sync {
    /// Produces the templates to send, in order.
    fn translate(&self, event: &IncomingEvent) -> Vec<OutgoingEventTemplate>;
}

/// The Keptn project and stage every emitted event is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeptnTarget {
    pub project: String,
    pub stage: String,
}

impl Default for KeptnTarget {
    fn default() -> Self {
        Self {
            project: "cde".to_string(),
            stage: "production".to_string(),
        }
    }
}

impl KeptnTarget {
    fn event_data(&self, service: &str) -> EventData {
        EventData {
            project: self.project.clone(),
            stage: self.stage.clone(),
            service: service.to_string(),
            status: None,
            result: None,
            message: String::new(),
        }
    }
}

/// Deterministic deployment URI for a service.
pub fn deployment_uri(service: &str) -> String {
    format!("http://{service}-127.0.0.1.nip.io")
}

// ---------------------------------------------------------------------------
// cd.artifact.packaged.v1
// ---------------------------------------------------------------------------

/// Starts a Keptn delivery for a freshly packaged artifact.
///
/// The artifact id becomes the `image` configuration value and the artifact
/// name the service. The artifact version is not used.
#[derive(Debug, Clone, Default)]
pub struct ArtifactPackagedTranslator {
    target: KeptnTarget,
}

impl ArtifactPackagedTranslator {
    pub fn new(target: KeptnTarget) -> Self {
        Self { target }
    }
}

impl Translator for ArtifactPackagedTranslator {
    fn translate(&self, event: &IncomingEvent) -> Vec<OutgoingEventTemplate> {
        let artifact_id = event
            .extension(extensions::ARTIFACT_ID)
            .and_then(ArtifactId::new);
        let artifact_name = event.extension(extensions::ARTIFACT_NAME).unwrap_or_default();

        let mut values = Map::new();
        values.insert(
            "image".to_string(),
            Value::String(artifact_id.map(|id| id.to_string()).unwrap_or_default()),
        );

        let data = DeliveryTriggeredData {
            base: EventData {
                message: TEKTON_MESSAGE.to_string(),
                ..self.target.event_data(artifact_name)
            },
            configuration_change: ConfigurationChange { values },
        };

        vec![OutgoingEventTemplate::new(EventPayload::DeliveryTriggered(data))]
    }
}

// ---------------------------------------------------------------------------
// cd.artifact.published.v1
// ---------------------------------------------------------------------------

/// Reports that the deployment of a published artifact has started.
///
/// If an upstream system already holds a Keptn context or trigger id, it
/// forwards them as `shkeptncontext` / `triggerid` in the event data and the
/// template is pre-populated with them.
#[derive(Debug, Clone, Default)]
pub struct ArtifactPublishedTranslator {
    target: KeptnTarget,
}

impl ArtifactPublishedTranslator {
    pub fn new(target: KeptnTarget) -> Self {
        Self { target }
    }
}

impl Translator for ArtifactPublishedTranslator {
    fn translate(&self, event: &IncomingEvent) -> Vec<OutgoingEventTemplate> {
        let artifact_name = event.extension(extensions::ARTIFACT_NAME).unwrap_or_default();

        let data = EventData {
            status: Some(TaskStatus::Unknown),
            message: TEKTON_MESSAGE.to_string(),
            ..self.target.event_data(artifact_name)
        };
        let mut template = OutgoingEventTemplate::new(EventPayload::DeploymentStarted(data));

        if let Some(context) = event.payload_str(PAYLOAD_CONTEXT_KEY).and_then(ConversationId::new) {
            tracing::debug!(conversation_id = %context, "found upstream Keptn context");
            template = template.with_conversation_id(context);
        }
        if let Some(trigger) = event.payload_str(PAYLOAD_TRIGGER_ID_KEY).and_then(TriggerId::new) {
            tracing::debug!(trigger_id = %trigger, "found upstream Keptn trigger id");
            template = template.with_trigger_id(trigger);
        }

        vec![template]
    }
}

// ---------------------------------------------------------------------------
// cd.service.deployed.v1
// ---------------------------------------------------------------------------

/// Reports a finished deployment.
///
/// Correlation comes from the Tekton PipelineRun embedded in the payload: the
/// `sh.keptn.context` and `sh.keptn.trigger.id` pipeline results.
#[derive(Debug, Clone, Default)]
pub struct ServiceDeployedTranslator {
    target: KeptnTarget,
}

impl ServiceDeployedTranslator {
    pub fn new(target: KeptnTarget) -> Self {
        Self { target }
    }
}

impl Translator for ServiceDeployedTranslator {
    fn translate(&self, event: &IncomingEvent) -> Vec<OutgoingEventTemplate> {
        let service = match event.extension(extensions::SERVICE_NAME).and_then(ServiceName::new) {
            Some(name) => name.to_string(),
            None => {
                tracing::warn!(
                    event_id = event.id(),
                    fallback = FALLBACK_SERVICE_NAME,
                    "no service name in service.deployed event, using fallback"
                );
                FALLBACK_SERVICE_NAME.to_string()
            }
        };
        tracing::debug!(
            %service,
            environment = event.extension(extensions::SERVICE_ENV_ID),
            version = event.extension(extensions::SERVICE_VERSION),
            "translating service.deployed event"
        );
        let uri = deployment_uri(&service);

        let data = DeploymentFinishedData {
            base: EventData {
                status: Some(TaskStatus::Succeeded),
                result: Some(TaskResult::Pass),
                ..self.target.event_data(&service)
            },
            deployment: DeploymentDetails {
                strategy: "direct".to_string(),
                uris_local: vec![uri.clone()],
                uris_public: vec![uri],
                names: vec![service],
                git_commit: "main".to_string(),
            },
        };
        let mut template = OutgoingEventTemplate::new(EventPayload::DeploymentFinished(data));

        let results = event.pipeline_results(PIPELINE_RUN_KEY);
        if let Some(context) = results.get(CONTEXT_RESULT).and_then(ConversationId::new) {
            tracing::debug!(conversation_id = %context, "received Keptn context from pipeline run");
            template = template.with_conversation_id(context);
        }
        if let Some(trigger) = results.get(TRIGGER_ID_RESULT).and_then(TriggerId::new) {
            tracing::debug!(trigger_id = %trigger, "received Keptn trigger id from pipeline run");
            template = template.with_trigger_id(trigger);
        }

        vec![template]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incoming::event_types;
    use crate::OutgoingEventType;
    use serde_json::json;

    fn single(templates: Vec<OutgoingEventTemplate>) -> OutgoingEventTemplate {
        assert_eq!(templates.len(), 1);
        templates.into_iter().next().unwrap()
    }

    #[test]
    fn artifact_packaged_maps_id_to_image_and_name_to_service() {
        let event = IncomingEvent::new(event_types::ARTIFACT_PACKAGED)
            .with_extension(extensions::ARTIFACT_ID, "ghcr.io/acme/podtato:1.2")
            .with_extension(extensions::ARTIFACT_NAME, "podtato-head")
            .with_extension(extensions::ARTIFACT_VERSION, "1.2");

        let template = single(ArtifactPackagedTranslator::default().translate(&event));
        assert_eq!(template.event_type(), OutgoingEventType::DeliveryTriggered);
        assert!(template.conversation_id.is_none());

        let EventPayload::DeliveryTriggered(data) = &template.payload else {
            panic!("unexpected payload {:?}", template.payload);
        };
        assert_eq!(
            data.configuration_change.values.get("image"),
            Some(&json!("ghcr.io/acme/podtato:1.2"))
        );
        assert_eq!(data.base.service, "podtato-head");
        assert_eq!(data.base.project, "cde");
        assert_eq!(data.base.stage, "production");
    }

    #[test]
    fn artifact_packaged_ignores_version() {
        let with_version = IncomingEvent::new(event_types::ARTIFACT_PACKAGED)
            .with_extension(extensions::ARTIFACT_ID, "img")
            .with_extension(extensions::ARTIFACT_NAME, "svc")
            .with_extension(extensions::ARTIFACT_VERSION, "9.9.9");
        let without_version = IncomingEvent::new(event_types::ARTIFACT_PACKAGED)
            .with_extension(extensions::ARTIFACT_ID, "img")
            .with_extension(extensions::ARTIFACT_NAME, "svc");

        let translator = ArtifactPackagedTranslator::default();
        let a = single(translator.translate(&with_version));
        let b = single(translator.translate(&without_version));
        assert_eq!(a, b);
        assert!(b.build().is_ok());
    }

    #[test]
    fn artifact_published_uses_upstream_correlation() {
        let event = IncomingEvent::new(event_types::ARTIFACT_PUBLISHED)
            .with_extension(extensions::ARTIFACT_NAME, "svc")
            .with_payload(json!({ "shkeptncontext": "ctx-up", "triggerid": "trig-up" }).to_string());

        let template = single(ArtifactPublishedTranslator::default().translate(&event));
        assert_eq!(template.event_type(), OutgoingEventType::DeploymentStarted);
        assert_eq!(template.conversation_id.as_ref().map(|c| c.as_str()), Some("ctx-up"));
        assert_eq!(template.trigger_id.as_ref().map(|t| t.as_str()), Some("trig-up"));
        assert_eq!(template.payload.base().status, Some(TaskStatus::Unknown));
    }

    #[test]
    fn artifact_published_without_payload_leaves_correlation_empty() {
        let event = IncomingEvent::new(event_types::ARTIFACT_PUBLISHED)
            .with_extension(extensions::ARTIFACT_NAME, "svc");

        let template = single(ArtifactPublishedTranslator::default().translate(&event));
        assert!(template.conversation_id.is_none());
        assert!(template.trigger_id.is_none());
    }

    #[test]
    fn service_deployed_uris_are_deterministic() {
        let event = IncomingEvent::new(event_types::SERVICE_DEPLOYED)
            .with_extension(extensions::SERVICE_NAME, "podtato-head");
        let translator = ServiceDeployedTranslator::default();

        let first = single(translator.translate(&event));
        let second = single(translator.translate(&event));
        assert_eq!(first, second);

        let EventPayload::DeploymentFinished(data) = &first.payload else {
            panic!("unexpected payload {:?}", first.payload);
        };
        assert_eq!(data.deployment.uris_local, vec![deployment_uri("podtato-head")]);
        assert_eq!(data.deployment.uris_public, vec!["http://podtato-head-127.0.0.1.nip.io"]);
        assert_eq!(data.deployment.names, vec!["podtato-head"]);
        assert_eq!(data.base.result, Some(TaskResult::Pass));
    }

    #[test]
    fn service_deployed_falls_back_when_name_missing() {
        let event = IncomingEvent::new(event_types::SERVICE_DEPLOYED);

        let template = single(ServiceDeployedTranslator::default().translate(&event));
        assert_eq!(template.payload.base().service, FALLBACK_SERVICE_NAME);

        let built = template.build().unwrap();
        let EventPayload::DeploymentFinished(data) = built.data() else {
            panic!("unexpected payload {:?}", built.data());
        };
        assert_eq!(data.deployment.uris_local, vec![deployment_uri(FALLBACK_SERVICE_NAME)]);
    }

    #[test]
    fn service_deployed_reads_correlation_from_pipeline_run() {
        let pipeline_run = json!({
            "status": { "pipelineResults": [
                { "name": CONTEXT_RESULT, "value": "abc" },
                { "name": TRIGGER_ID_RESULT, "value": "xyz" },
            ]}
        });
        let event = IncomingEvent::new(event_types::SERVICE_DEPLOYED)
            .with_extension(extensions::SERVICE_NAME, "svc")
            .with_payload(json!({ PIPELINE_RUN_KEY: pipeline_run.to_string() }).to_string());

        let template = single(ServiceDeployedTranslator::default().translate(&event));
        assert_eq!(template.conversation_id, ConversationId::new("abc"));
        assert_eq!(template.trigger_id, TriggerId::new("xyz"));
    }

    #[test]
    fn service_deployed_takes_last_repeated_pipeline_result() {
        let pipeline_run = json!({
            "status": { "pipelineResults": [
                { "name": CONTEXT_RESULT, "value": "first" },
                { "name": TRIGGER_ID_RESULT, "value": "t-1" },
                { "name": CONTEXT_RESULT, "value": "second" },
                { "name": TRIGGER_ID_RESULT, "value": "t-2" },
            ]}
        });
        let event = IncomingEvent::new(event_types::SERVICE_DEPLOYED)
            .with_extension(extensions::SERVICE_NAME, "svc")
            .with_payload(json!({ PIPELINE_RUN_KEY: pipeline_run.to_string() }).to_string());

        let template = single(ServiceDeployedTranslator::default().translate(&event));
        assert_eq!(template.conversation_id, ConversationId::new("second"));
        assert_eq!(template.trigger_id, TriggerId::new("t-2"));
    }

    #[test]
    fn service_deployed_environment_and_version_do_not_change_output() {
        let plain = IncomingEvent::new(event_types::SERVICE_DEPLOYED)
            .with_extension(extensions::SERVICE_NAME, "svc");
        let detailed = plain
            .clone()
            .with_extension(extensions::SERVICE_ENV_ID, "prod-eu")
            .with_extension(extensions::SERVICE_VERSION, "2.0.1");

        let translator = ServiceDeployedTranslator::default();
        assert_eq!(
            single(translator.translate(&plain)),
            single(translator.translate(&detailed))
        );
    }

    #[test]
    fn service_deployed_with_broken_pipeline_run_still_translates() {
        let event = IncomingEvent::new(event_types::SERVICE_DEPLOYED)
            .with_extension(extensions::SERVICE_NAME, "svc")
            .with_payload(json!({ PIPELINE_RUN_KEY: "{broken" }).to_string());

        let template = single(ServiceDeployedTranslator::default().translate(&event));
        assert!(template.conversation_id.is_none());
        assert!(template.trigger_id.is_none());
        assert!(template.build().is_ok());
    }

    #[test]
    fn custom_target_is_applied() {
        let target = KeptnTarget {
            project: "shop".into(),
            stage: "staging".into(),
        };
        let event = IncomingEvent::new(event_types::ARTIFACT_PACKAGED)
            .with_extension(extensions::ARTIFACT_NAME, "cart");

        let template = single(ArtifactPackagedTranslator::new(target).translate(&event));
        let built = template.build().unwrap();
        assert_eq!(built.event_type(), "sh.keptn.event.staging.delivery.triggered");
        assert_eq!(built.data().base().project, "shop");
    }
}

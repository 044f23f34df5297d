//! Route table and dispatch loop.
//!
//! [`TranslatorRegistry`] maps an incoming event type to exactly one
//! [`Translator`]. It is populated at startup and then moved into a
//! [`Dispatcher`], which only ever reads it; concurrent dispatches share the
//! dispatcher behind an `Arc` without locking.
//!
//! ## Dispatch
//!
//! ```text
//! Routed ─┬─> Unhandled ─────────────────────────────> Done
//!         └─> Translated ─> { Sending(i) ─> Sent(i) }* ─> Done
//!                              └─> Failed ─────────────> Done
//! ```
//!
//! Sends are strictly sequential. Event *i + 1* is built only after send *i*
//! returned, because its conversation identifier may come from that response.
//! The first build or send failure aborts the rest; nothing already sent is
//! rolled back and nothing is retried.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::Instrument;

use crate::incoming::event_types;
use crate::translators::{
    ArtifactPackagedTranslator, ArtifactPublishedTranslator, KeptnTarget,
    ServiceDeployedTranslator,
};
use crate::{
    ConversationId, Destination, DispatchError, DownstreamSender, IncomingEvent,
    OutgoingEventTemplate, Translator, TriggerId,
};

// ---------------------------------------------------------------------------
// Route table
// ---------------------------------------------------------------------------

/// Event type → translator. Keys are matched exactly and case-sensitively.
#[derive(Default)]
pub struct TranslatorRegistry {
    translators: HashMap<String, Arc<dyn Translator>>,
}

impl TranslatorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the three CDF translators addressed to `target`.
    pub fn with_defaults(target: KeptnTarget) -> Self {
        let mut registry = Self::new();
        registry.register(
            event_types::ARTIFACT_PACKAGED,
            ArtifactPackagedTranslator::new(target.clone()),
        );
        registry.register(
            event_types::ARTIFACT_PUBLISHED,
            ArtifactPublishedTranslator::new(target.clone()),
        );
        registry.register(
            event_types::SERVICE_DEPLOYED,
            ServiceDeployedTranslator::new(target),
        );
        registry
    }

    /// Registers `translator` for `event_type`, replacing any earlier one.
    ///
    /// Returns `true` if a translator was replaced.
    pub fn register<T>(&mut self, event_type: impl Into<String>, translator: T) -> bool
    where
        T: Translator + 'static,
    {
        let event_type = event_type.into();
        let replaced = self
            .translators
            .insert(event_type.clone(), Arc::new(translator))
            .is_some();
        if replaced {
            tracing::warn!(%event_type, "translator already registered, replacing");
        } else {
            tracing::debug!(%event_type, "registered translator");
        }
        replaced
    }

    /// Looks up the translator for `event_type`.
    pub fn get(&self, event_type: &str) -> Option<&dyn Translator> {
        self.translators.get(event_type).map(|t| t.as_ref())
    }

    /// Registered event types, sorted.
    pub fn event_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.translators.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Number of registered event types.
    pub fn len(&self) -> usize {
        self.translators.len()
    }

    /// Returns `true` if no translator is registered.
    pub fn is_empty(&self) -> bool {
        self.translators.is_empty()
    }
}

impl std::fmt::Debug for TranslatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslatorRegistry")
            .field("event_types", &self.event_types())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Correlation
// ---------------------------------------------------------------------------

/// Correlation identifiers threaded through one dispatch. Starts empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrelationState {
    pub conversation_id: Option<ConversationId>,
    pub trigger_id: Option<TriggerId>,
}

impl CorrelationState {
    /// Fills the identifiers `template` leaves unset from the current state.
    ///
    /// An identifier the template sets itself is kept. If the state has none
    /// yet, the template's identifier is adopted for the events that follow.
    pub fn apply(&mut self, mut template: OutgoingEventTemplate) -> OutgoingEventTemplate {
        fill(&mut self.conversation_id, &mut template.conversation_id);
        fill(&mut self.trigger_id, &mut template.trigger_id);
        template
    }

    /// Records the conversation identifier returned by a successful send.
    ///
    /// The downstream system is authoritative, so every returned identifier
    /// replaces the previous one.
    pub fn record_sent(&mut self, returned: Option<ConversationId>) {
        if let Some(id) = returned {
            self.conversation_id = Some(id);
        }
    }
}

fn fill<T: Clone>(state: &mut Option<T>, template: &mut Option<T>) {
    if template.is_none() {
        template.clone_from(state);
    } else if state.is_none() {
        state.clone_from(template);
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// How a dispatch ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No translator is registered for the event type. Nothing was sent.
    Unhandled {
        event_type: String,
    },
    /// Every translated event was sent.
    Completed {
        /// Number of events sent (zero if the translator produced none).
        sent: usize,
        /// Conversation identifier in effect after the last send.
        conversation_id: Option<ConversationId>,
    },
}

/// Routes incoming events to translators and sends the results downstream.
pub struct Dispatcher {
    registry: TranslatorRegistry,
    sender: Arc<dyn DownstreamSender>,
    destination: Destination,
}

impl Dispatcher {
    /// Creates a dispatcher. Registration is finished once the registry is
    /// handed over.
    pub fn new(
        registry: TranslatorRegistry,
        sender: Arc<dyn DownstreamSender>,
        destination: Destination,
    ) -> Self {
        Self {
            registry,
            sender,
            destination,
        }
    }

    /// Handles one incoming event end to end.
    ///
    /// An unknown event type is not an error: it yields
    /// [`DispatchOutcome::Unhandled`] without sending anything.
    pub async fn handle(&self, event: &IncomingEvent) -> Result<DispatchOutcome, DispatchError> {
        let span = tracing::info_span!(
            "dispatch",
            event_type = %event.event_type(),
            event_id = %event.id(),
        );
        self.dispatch(event).instrument(span).await
    }

    async fn dispatch(&self, event: &IncomingEvent) -> Result<DispatchOutcome, DispatchError> {
        let Some(translator) = self.registry.get(event.event_type()) else {
            tracing::info!("no translator registered for event type");
            return Ok(DispatchOutcome::Unhandled {
                event_type: event.event_type().to_string(),
            });
        };

        let templates = translator.translate(event);
        tracing::debug!(count = templates.len(), "translated event");

        let mut correlation = CorrelationState::default();
        let mut sent = 0;
        for (index, template) in templates.into_iter().enumerate() {
            let template = correlation.apply(template);
            let outgoing = match template.build() {
                Ok(outgoing) => outgoing,
                Err(source) => {
                    tracing::error!(index, error = %source, "failed to build outgoing event");
                    return Err(DispatchError::Build { index, sent, source });
                }
            };

            tracing::info!(
                index,
                outgoing_type = outgoing.event_type(),
                outgoing_id = %outgoing.id(),
                conversation_id = outgoing.conversation_id().map(|c| c.as_str()),
                trigger_id = outgoing.trigger_id().map(|t| t.as_str()),
                "sending event downstream"
            );
            match self.sender.send(&outgoing, &self.destination).await {
                Ok(returned) => {
                    if let Some(id) = &returned {
                        tracing::debug!(index, conversation_id = %id, "downstream returned context");
                    }
                    correlation.record_sent(returned);
                    sent += 1;
                }
                Err(source) => {
                    tracing::error!(index, error = %source, "failed to send event downstream");
                    return Err(DispatchError::Send { index, sent, source });
                }
            }
        }

        Ok(DispatchOutcome::Completed {
            sent,
            conversation_id: correlation.conversation_id,
        })
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("destination", &self.destination)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EventData, EventPayload};

    struct Fixed(&'static str);

    impl Translator for Fixed {
        fn translate(&self, _event: &IncomingEvent) -> Vec<OutgoingEventTemplate> {
            vec![OutgoingEventTemplate::new(EventPayload::DeploymentStarted(EventData {
                project: "p".into(),
                stage: "s".into(),
                service: self.0.into(),
                status: None,
                result: None,
                message: String::new(),
            }))]
        }
    }

    fn template() -> OutgoingEventTemplate {
        Fixed("svc").translate(&IncomingEvent::new("t")).remove(0)
    }

    #[test]
    fn last_registration_wins() {
        let mut registry = TranslatorRegistry::new();
        assert!(registry.is_empty());
        assert!(!registry.register("t", Fixed("first")));
        assert!(registry.register("t", Fixed("second")));
        assert_eq!(registry.len(), 1);
        assert!(!registry.is_empty());

        let out = registry.get("t").unwrap().translate(&IncomingEvent::new("t"));
        assert_eq!(out[0].payload.base().service, "second");
    }

    #[test]
    fn lookup_is_exact_and_case_sensitive() {
        let registry = TranslatorRegistry::with_defaults(KeptnTarget::default());
        assert_eq!(registry.len(), 3);
        assert!(registry.get(event_types::SERVICE_DEPLOYED).is_some());
        assert!(registry.get("CD.SERVICE.DEPLOYED.V1").is_none());
        assert!(registry.get("cd.service.deployed").is_none());
        assert!(registry.get("cd.service.*").is_none());
    }

    #[test]
    fn correlation_fills_only_missing_identifiers() {
        let mut state = CorrelationState {
            conversation_id: ConversationId::new("propagated"),
            trigger_id: TriggerId::new("propagated-trigger"),
        };

        let explicit =
            state.apply(template().with_conversation_id(ConversationId::new("explicit").unwrap()));
        assert_eq!(explicit.conversation_id, ConversationId::new("explicit"));
        assert_eq!(explicit.trigger_id, TriggerId::new("propagated-trigger"));
        assert_eq!(state.conversation_id, ConversationId::new("propagated"));
    }

    #[test]
    fn correlation_adopts_template_identifiers_when_empty() {
        let mut state = CorrelationState::default();
        state.apply(template().with_trigger_id(TriggerId::new("from-payload").unwrap()));
        assert_eq!(state.trigger_id, TriggerId::new("from-payload"));

        let next = state.apply(template());
        assert_eq!(next.trigger_id, TriggerId::new("from-payload"));
        assert!(next.conversation_id.is_none());
    }

    #[test]
    fn returned_conversation_overwrites() {
        let mut state = CorrelationState::default();
        state.record_sent(ConversationId::new("one"));
        state.record_sent(None);
        assert_eq!(state.conversation_id, ConversationId::new("one"));
        state.record_sent(ConversationId::new("two"));
        assert_eq!(state.conversation_id, ConversationId::new("two"));
    }
}

//! CDF-to-Keptn translation domain.
//!
//! Receives CDF (sig-events) notifications about packaged or published
//! artifacts and deployed services, and re-emits them as Keptn events while
//! threading Keptn's conversation (`shkeptncontext`) and trigger
//! (`triggeredid`) identifiers across the events of one dispatch.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! The inbound HTTP listener lives in `listener`; the HTTP client for the
//! Keptn API lives in `keptn` and implements [`DownstreamSender`].
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`ConversationId`, `TriggerId`, ...) |
//! | [`types`] | `Timestamp`, `ApiToken`, `Destination` |
//! | [`incoming`] | `IncomingEvent` and flat attribute extraction |
//! | [`pipeline_results`] | Two-stage decode of Tekton results embedded in a payload |
//! | [`outgoing`] | Outgoing templates, payloads, and finalised Keptn CloudEvents |
//! | [`translators`] | One translator per CDF event type |
//! | [`registry`] | Route table, correlation state, and the dispatch loop |
//! | [`sender`] | The `DownstreamSender` port |
//! | [`errors`] | Build, send, and dispatch errors |

pub mod errors;
pub mod identifiers;
pub mod incoming;
pub mod outgoing;
pub mod pipeline_results;
pub mod registry;
pub mod sender;
pub mod translators;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use errors::{BuildError, DestinationError, DispatchError, SendError};
pub use identifiers::{ArtifactId, ConversationId, EventId, ServiceName, TriggerId};
pub use incoming::{event_types, extensions, IncomingEvent};
pub use outgoing::{
    ConfigurationChange, DeliveryTriggeredData, DeploymentDetails, DeploymentFinishedData,
    EventData, EventPayload, OutgoingEvent, OutgoingEventTemplate, OutgoingEventType, TaskResult,
    TaskStatus,
};
pub use pipeline_results::{PipelineResult, PipelineResults};
pub use registry::{CorrelationState, DispatchOutcome, Dispatcher, TranslatorRegistry};
pub use sender::DownstreamSender;
pub use translators::{
    deployment_uri, ArtifactPackagedTranslator, ArtifactPublishedTranslator, KeptnTarget,
    ServiceDeployedTranslator, Translator,
};
pub use types::{ApiToken, Destination, Timestamp};

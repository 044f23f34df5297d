//! Newtype domain identifiers.
//!
//! Correlation identifiers and the names copied between the CDF and Keptn
//! vocabularies are distinct newtypes, so a [`ConversationId`] can never be
//! passed where a [`TriggerId`] is expected even though both are strings on
//! the wire.
//!
//! String-backed identifiers cannot be empty. Upstream systems routinely send
//! `""` for "not set"; [`string_id!`]-generated constructors map that to
//! `None`, which is how absence is represented throughout the crate.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Correlation identifiers
// ---------------------------------------------------------------------------

string_id! {
    /// Groups every event of one logical delivery run in the downstream
    /// control plane.
    ///
    /// Serialised as the `shkeptncontext` CloudEvent extension.
    ConversationId
}

string_id! {
    /// Identifies the upstream action that caused an event, chaining
    /// `.triggered` → `.started` → `.finished` pairs together.
    ///
    /// Serialised as the `triggeredid` CloudEvent extension.
    TriggerId
}

// ---------------------------------------------------------------------------
// Names carried across from the incoming event
// ---------------------------------------------------------------------------

string_id! {
    /// A Keptn service name (taken from `artifactname` or `servicename`).
    ServiceName
}

string_id! {
    /// An artifact reference, typically a container image (`artifactid`).
    ArtifactId
}

// ---------------------------------------------------------------------------
// Identifiers — UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies one outgoing CloudEvent.
///
/// Generated fresh every time an [`crate::OutgoingEventTemplate`] is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Generates a new random event identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

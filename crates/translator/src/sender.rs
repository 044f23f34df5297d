//! Port to the downstream control plane.
//!
//! The `keptn` crate implements [`DownstreamSender`] over HTTP. Tests use
//! in-memory stubs. Timeouts and any retry policy belong to the implementation;
//! the dispatch loop awaits each call to completion before starting the next.

use async_trait::async_trait;

use crate::{ConversationId, Destination, OutgoingEvent, SendError};

/// Delivers one finalised event and reports the conversation identifier the
/// downstream system assigned to it.
#[async_trait]
pub trait DownstreamSender: Send + Sync {
    /// Sends `event` to `destination`.
    ///
    /// Returns `Ok(None)` when the downstream system accepted the event but
    /// did not return a conversation identifier.
    async fn send(
        &self,
        event: &OutgoingEvent,
        destination: &Destination,
    ) -> Result<Option<ConversationId>, SendError>;
}

//! ProcessedEventStore port - Interface for tracking delivered callbacks.
//!
//! Lark redelivers a callback when it does not get a response within a few
//! seconds, which is routinely the case while the bridge waits for an
//! answer. Claiming the event id before asking keeps a redelivery from
//! producing a second reply.
//!
//! # Example
//!
//! ```ignore
//! if !store.claim(event_id).await {
//!     return Ok(DispatchOutcome::Duplicate); // already being handled
//! }
//!
//! if let Err(e) = handle(event).await {
//!     store.release(event_id).await; // let the platform's retry through
//!     return Err(e);
//! }
//! ```

use async_trait::async_trait;

/// Port for claiming callback event ids.
#[async_trait]
pub trait ProcessedEventStore: Send + Sync {
    /// Claims an event id.
    ///
    /// Returns `true` if this is the first claim, `false` for a duplicate.
    async fn claim(&self, event_id: &str) -> bool;

    /// Drops a claim so a redelivery of the same event is handled again.
    async fn release(&self, event_id: &str);
}

//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the application to external systems:
//! - `ai` - AI vendor websocket (Spark) and its test double
//! - `lark` - Lark message API client and a recording mock
//! - `events` - Processed-event bookkeeping
//! - `http` - Axum callback server

pub mod ai;
pub mod events;
pub mod http;
pub mod lark;

pub use ai::{MockReply, MockVendorConnector, SparkConfig, SparkConnector};
pub use events::InMemoryProcessedEventStore;
pub use http::{webhook_router, WebhookAppState};
pub use lark::{LarkConfig, LarkMessageClient, MockChatPlatform};

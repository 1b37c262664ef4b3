//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the bridge and the outside world. Adapters implement these ports.
//!
//! - `AnswerSource` - synchronous `ask(question) -> answer` (the correlation bridge)
//! - `ChatPlatform` - outbound messages to Lark
//! - `VendorConnector` / `VendorConnection` - the AI vendor's websocket conversation
//! - `ProcessedEventStore` - redelivery tracking for callbacks

mod answer_source;
mod chat_platform;
mod processed_event_store;
mod vendor_channel;

pub use answer_source::AnswerSource;
pub use chat_platform::{ChatPlatform, ChatPlatformError};
pub use processed_event_store::ProcessedEventStore;
pub use vendor_channel::{AnswerChunk, VendorConnection, VendorConnector, VendorError};

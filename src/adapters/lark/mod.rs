//! Lark open platform adapters.
//!
//! - `LarkMessageClient` - IM message API with tenant token caching
//! - `MockChatPlatform` - Recording mock for testing

mod message_client;
mod mock_chat_platform;

pub use message_client::{LarkConfig, LarkMessageClient};
pub use mock_chat_platform::{MockChatPlatform, SentMessage};

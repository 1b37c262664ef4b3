//! Domain layer containing the bridge's value types and rules.
//!
//! # Module Organization
//!
//! - `session_state` - Answer channel session lifecycle
//! - `errors` - Bridge and dispatcher error taxonomy
//! - `event` - Inbound Lark callback classification
//! - `text_content` - Text message content encoding
//! - `signature` - Lark request signature verification

pub mod errors;
pub mod event;
pub mod session_state;
pub mod signature;
pub mod text_content;

pub use errors::{BridgeError, DispatchError};
pub use event::{EventHeader, InboundEvent, MessageReceive, UrlVerification};
pub use session_state::SessionState;
pub use signature::{LarkSignatureVerifier, SignatureError, SignatureHeaders};
pub use text_content::TextContent;

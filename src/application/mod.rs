//! Application layer - the correlation bridge, its vendor session, and the
//! callback handler.
//!
//! - `bridge` - `CorrelationBridge` (HTTP side) and `SessionEndpoint` (vendor side)
//! - `session` - `AnswerChannelSession` and the `SessionDriver` task
//! - `dispatcher` - `WebhookDispatcher`, one call per Lark callback

pub mod bridge;
pub mod dispatcher;
pub mod session;

pub use bridge::{AnswerEnvelope, CorrelationBridge, PendingQuestion, SessionEndpoint, Ticket};
pub use dispatcher::{DispatchOutcome, HandleCallbackCommand, WebhookDispatcher};
pub use session::{AnswerChannelSession, SessionConfig, SessionDriver};

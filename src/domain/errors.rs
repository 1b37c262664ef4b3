//! Error types for the bridge and the webhook dispatcher.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | Authentication | 401 |
//! | MalformedEvent | 400 |
//! | Upstream | upstream status (500 when none) |
//! | Bridge(SessionUnavailable / AnswerLost / SessionClosed) | 503 |
//! | Bridge(SessionTimeout) | 504 |

use thiserror::Error;

use super::session_state::SessionState;

/// Failures of a single `ask` round trip through the correlation bridge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The answer session is not connected to the vendor.
    #[error("answer session unavailable (session is {state})")]
    SessionUnavailable { state: SessionState },

    /// No answer arrived within the configured bound.
    #[error("no answer within {timeout_secs}s")]
    SessionTimeout { timeout_secs: u64 },

    /// The question was accepted but its answer can no longer arrive.
    #[error("answer lost: {reason}")]
    AnswerLost { reason: String },

    /// The session driver has shut down.
    #[error("answer session closed")]
    SessionClosed,
}

impl BridgeError {
    pub fn unavailable(state: SessionState) -> Self {
        BridgeError::SessionUnavailable { state }
    }

    pub fn timeout(timeout_secs: u64) -> Self {
        BridgeError::SessionTimeout { timeout_secs }
    }

    pub fn answer_lost(reason: impl Into<String>) -> Self {
        BridgeError::AnswerLost {
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by the webhook dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// Verification token or request signature did not match.
    #[error("{0}")]
    Authentication(String),

    /// The request body is not an event we understand.
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// The chat platform rejected or failed the outbound call.
    #[error("chat platform error: {message}")]
    Upstream {
        /// HTTP status reported by the platform, if the failure was an HTTP error.
        status: Option<u16>,
        message: String,
    },

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl DispatchError {
    pub fn authentication(message: impl Into<String>) -> Self {
        DispatchError::Authentication(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        DispatchError::MalformedEvent(message.into())
    }

    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        DispatchError::Upstream {
            status,
            message: message.into(),
        }
    }

    /// Short machine-readable label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::Authentication(_) => "authentication",
            DispatchError::MalformedEvent(_) => "malformed_event",
            DispatchError::Upstream { .. } => "upstream_http",
            DispatchError::Bridge(BridgeError::SessionUnavailable { .. }) => "session_unavailable",
            DispatchError::Bridge(BridgeError::SessionTimeout { .. }) => "session_timeout",
            DispatchError::Bridge(BridgeError::AnswerLost { .. }) => "answer_lost",
            DispatchError::Bridge(BridgeError::SessionClosed) => "session_closed",
        }
    }
}

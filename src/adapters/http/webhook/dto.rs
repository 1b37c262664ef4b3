//! Request/response bodies for the callback endpoint.

use serde::{Deserialize, Serialize};

use crate::domain::SessionState;

/// Body answering a URL verification challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeResponse {
    pub challenge: String,
}

/// Body acknowledging an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckResponse {}

/// Error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub message: String,
    /// Machine-readable error kind, e.g. `session_timeout`.
    pub error_code: String,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_code: error_code.into(),
        }
    }
}

/// `GET /health` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub session: SessionState,
}

impl HealthResponse {
    pub fn ok(session: SessionState) -> Self {
        Self {
            status: "ok".to_string(),
            session,
        }
    }
}

//! ChatPlatform port - outbound messages to the chat platform.

use async_trait::async_trait;

use crate::domain::DispatchError;

/// Port for sending messages back to chat users.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Sends a text message to the user identified by `open_id`.
    ///
    /// `content` is the platform's JSON-encoded text body, e.g. `{"text": "hi"}`.
    async fn send_text(&self, open_id: &str, content: &str) -> Result<(), ChatPlatformError>;
}

/// Chat platform errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatPlatformError {
    /// The platform answered with a non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The platform answered 200 with a non-zero business code.
    #[error("code {code}: {msg}")]
    Api { code: i64, msg: String },

    /// The request never completed.
    #[error("network error: {0}")]
    Network(String),
}

impl ChatPlatformError {
    /// HTTP status to propagate to our caller, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ChatPlatformError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<ChatPlatformError> for DispatchError {
    fn from(err: ChatPlatformError) -> Self {
        DispatchError::upstream(err.status(), err.to_string())
    }
}

//! Vendor channel ports - the AI vendor's websocket conversation.
//!
//! The answer channel session only knows how to send a question and how to
//! read answer chunks. Framing, URL signing and the transport live in the
//! adapters (`adapters::ai` for the real vendor, `MockVendorConnector`
//! for tests).
//!
//! # Design
//!
//! - `VendorConnector::connect` is called on every (re)connect, so signed
//!   URLs are recomputed each time
//! - `VendorConnection::next_chunk` must be cancel-safe: the session drives
//!   it inside `tokio::select!`

use async_trait::async_trait;

/// Factory for vendor connections.
#[async_trait]
pub trait VendorConnector: Send + Sync {
    /// Opens and authenticates a new connection.
    async fn connect(&self) -> Result<Box<dyn VendorConnection>, VendorError>;
}

/// One open vendor connection.
#[async_trait]
pub trait VendorConnection: Send {
    /// Sends the request frame for `question`.
    async fn send_question(&mut self, question: &str) -> Result<(), VendorError>;

    /// Waits for the next answer chunk.
    ///
    /// Returns `None` once the vendor has closed the connection.
    async fn next_chunk(&mut self) -> Option<Result<AnswerChunk, VendorError>>;
}

/// One decoded answer frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerChunk {
    /// Text fragment to append to the answer.
    pub content: String,
    /// True on the last frame of an answer.
    pub is_final: bool,
}

impl AnswerChunk {
    pub fn partial(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_final: false,
        }
    }

    pub fn last(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_final: true,
        }
    }
}

/// Vendor channel errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VendorError {
    /// Handshake did not complete.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Transport failure on an open connection.
    #[error("transport error: {0}")]
    Transport(String),

    /// The vendor answered with an error frame.
    #[error("vendor rejected request: code {code}: {message}")]
    Rejected { code: i64, message: String },

    /// A frame could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(String),
}

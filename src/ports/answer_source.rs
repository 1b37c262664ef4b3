//! AnswerSource port - the synchronous question/answer contract.
//!
//! The webhook dispatcher depends on this port rather than on the
//! correlation bridge directly, so it can be exercised with canned answers.

use async_trait::async_trait;

use crate::domain::BridgeError;

/// Port for obtaining the complete answer to one question.
#[async_trait]
pub trait AnswerSource: Send + Sync {
    /// Blocks the calling task until the answer to `question` is available.
    ///
    /// # Errors
    ///
    /// - `SessionUnavailable` - no vendor connection right now
    /// - `SessionTimeout` - no answer within the configured bound
    /// - `AnswerLost` - the connection dropped while the answer was pending
    async fn ask(&self, question: String) -> Result<String, BridgeError>;
}

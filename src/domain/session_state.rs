//! SessionState enum for tracking the vendor websocket conversation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of the answer channel session.
///
/// ```text
/// Disconnected --connect--> Connecting --handshake ok--> Ready
/// Connecting --handshake failed--> Disconnected
/// Ready --question sent--> AwaitingAnswer --final chunk--> Ready
/// any --connection dropped--> Disconnected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Ready,
    AwaitingAnswer,
}

impl SessionState {
    /// Returns true if the bridge may hand a question to the session.
    ///
    /// `AwaitingAnswer` still accepts: the slot holder's question waits in the
    /// handoff queue until the abandoned previous answer is delivered.
    pub fn accepts_questions(&self) -> bool {
        matches!(self, SessionState::Ready | SessionState::AwaitingAnswer)
    }

    /// Validates a transition from this state to another.
    pub fn can_transition_to(&self, target: &SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, target),
            (Disconnected, Connecting)
                | (Connecting, Ready)
                | (Ready, AwaitingAnswer)
                | (AwaitingAnswer, Ready)
                | (Connecting | Ready | AwaitingAnswer, Disconnected)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Ready => "ready",
            SessionState::AwaitingAnswer => "awaiting-answer",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

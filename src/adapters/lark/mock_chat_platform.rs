//! Recording chat platform for testing.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::ports::{ChatPlatform, ChatPlatformError};

/// A message handed to the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub open_id: String,
    pub content: String,
}

#[derive(Debug, Default)]
struct Recorded {
    sent: Vec<SentMessage>,
    failure: Option<ChatPlatformError>,
}

/// `ChatPlatform` that records every send.
///
/// Clones share the recording.
#[derive(Debug, Clone, Default)]
pub struct MockChatPlatform {
    inner: Arc<Mutex<Recorded>>,
}

impl MockChatPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every send with `error` (the attempt is still recorded).
    pub fn failing_with(self, error: ChatPlatformError) -> Self {
        self.lock().failure = Some(error);
        self
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.lock().sent.clone()
    }

    pub fn send_count(&self) -> usize {
        self.lock().sent.len()
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ChatPlatform for MockChatPlatform {
    async fn send_text(&self, open_id: &str, content: &str) -> Result<(), ChatPlatformError> {
        let mut recorded = self.lock();
        recorded.sent.push(SentMessage {
            open_id: open_id.to_string(),
            content: content.to_string(),
        });
        match &recorded.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

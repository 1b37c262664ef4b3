//! Mock vendor connector for testing.
//!
//! Scripted replacement for the Spark websocket, letting the answer session
//! and the full webhook pipeline run without network access.
//!
//! # Features
//!
//! - Scripted replies consumed in question order, across connections
//! - Echo mode for concurrency tests
//! - Connect failure injection
//! - Vendor-style close after every final chunk
//! - Question and connect tracking for verification
//!
//! # Example
//!
//! ```ignore
//! let connector = MockVendorConnector::new()
//!     .with_reply(MockReply::chunks(["hi", " there"]))
//!     .closing_after_answer();
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::ports::{AnswerChunk, VendorConnection, VendorConnector, VendorError};

/// A scripted reply to one question.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Answer frames; the last one is final.
    Chunks(Vec<String>),
    /// Close the connection instead of answering.
    Disconnect,
    /// Never answer.
    Silence,
    /// Answer with an error frame.
    Error(VendorError),
}

impl MockReply {
    pub fn chunks<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Chunks(parts.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Default)]
struct MockState {
    replies: VecDeque<MockReply>,
    questions: Vec<String>,
    connect_attempts: usize,
    connect_failures: usize,
}

/// Mock implementation of `VendorConnector`.
///
/// Clones share replies and call history.
#[derive(Debug, Clone, Default)]
pub struct MockVendorConnector {
    state: Arc<Mutex<MockState>>,
    echo: bool,
    chunk_delay: Duration,
    close_after_answer: bool,
    unsolicited: Option<AnswerChunk>,
}

impl MockVendorConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a reply for the next unanswered question.
    pub fn with_reply(self, reply: MockReply) -> Self {
        self.lock().replies.push_back(reply);
        self
    }

    /// Answers `echo: <question>` once scripted replies run out.
    pub fn echoing(mut self) -> Self {
        self.echo = true;
        self
    }

    /// Delays every frame.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Fails the first `count` connect attempts.
    pub fn with_connect_failures(self, count: usize) -> Self {
        self.lock().connect_failures = count;
        self
    }

    /// Closes each connection after its first final chunk, like Spark does.
    pub fn closing_after_answer(mut self) -> Self {
        self.close_after_answer = true;
        self
    }

    /// Emits `chunk` on every new connection before any question is asked.
    pub fn with_unsolicited(mut self, chunk: AnswerChunk) -> Self {
        self.unsolicited = Some(chunk);
        self
    }

    /// Questions received so far, across all connections.
    pub fn questions(&self) -> Vec<String> {
        self.lock().questions.clone()
    }

    pub fn connect_attempts(&self) -> usize {
        self.lock().connect_attempts
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl VendorConnector for MockVendorConnector {
    async fn connect(&self) -> Result<Box<dyn VendorConnection>, VendorError> {
        {
            let mut state = self.lock();
            state.connect_attempts += 1;
            if state.connect_failures > 0 {
                state.connect_failures -= 1;
                return Err(VendorError::Connect("mock connect failure".to_string()));
            }
        }

        let mut outbox = VecDeque::new();
        if let Some(chunk) = &self.unsolicited {
            outbox.push_back(Outgoing::Chunk(chunk.clone()));
        }

        Ok(Box::new(MockVendorConnection {
            connector: self.clone(),
            outbox,
        }))
    }
}

#[derive(Debug)]
enum Outgoing {
    Chunk(AnswerChunk),
    Error(VendorError),
    Close,
}

struct MockVendorConnection {
    connector: MockVendorConnector,
    outbox: VecDeque<Outgoing>,
}

impl MockVendorConnection {
    fn script(&mut self, reply: MockReply) {
        match reply {
            MockReply::Chunks(parts) => {
                let count = parts.len();
                for (i, part) in parts.into_iter().enumerate() {
                    let chunk = if i + 1 == count {
                        AnswerChunk::last(part)
                    } else {
                        AnswerChunk::partial(part)
                    };
                    self.outbox.push_back(Outgoing::Chunk(chunk));
                }
                if self.connector.close_after_answer {
                    self.outbox.push_back(Outgoing::Close);
                }
            }
            MockReply::Disconnect => self.outbox.push_back(Outgoing::Close),
            MockReply::Silence => {}
            MockReply::Error(error) => self.outbox.push_back(Outgoing::Error(error)),
        }
    }
}

#[async_trait]
impl VendorConnection for MockVendorConnection {
    async fn send_question(&mut self, question: &str) -> Result<(), VendorError> {
        // A closing connection accepts the write but the vendor never sees it.
        if self.outbox.iter().any(|out| matches!(out, Outgoing::Close)) {
            return Ok(());
        }

        let reply = {
            let mut state = self.connector.lock();
            state.questions.push(question.to_string());
            state.replies.pop_front()
        };

        let reply = match reply {
            Some(reply) => reply,
            None if self.connector.echo => MockReply::chunks(["echo: ", question]),
            None => MockReply::Silence,
        };
        self.script(reply);
        Ok(())
    }

    async fn next_chunk(&mut self) -> Option<Result<AnswerChunk, VendorError>> {
        if self.outbox.is_empty() {
            return std::future::pending().await;
        }
        if !self.connector.chunk_delay.is_zero() {
            tokio::time::sleep(self.connector.chunk_delay).await;
        }

        match self.outbox.pop_front()? {
            Outgoing::Chunk(chunk) => Some(Ok(chunk)),
            Outgoing::Error(error) => Some(Err(error)),
            Outgoing::Close => {
                // Keep returning None once closed.
                self.outbox.push_front(Outgoing::Close);
                None
            }
        }
    }
}

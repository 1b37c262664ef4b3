//! CorrelationBridge - synchronous `ask` over the asynchronous answer session.
//!
//! The bridge owns the two handoff queues shared with the answer channel
//! session:
//!
//! ```text
//!  request task                         session driver task
//!  ────────────                         ───────────────────
//!  ask(q) ──lock slot──► questions (mpsc, cap 1) ──► AnswerChannelSession
//!     ▲                                                    │
//!     └──────────── answers (mpsc, unbounded) ◄────────────┘
//! ```
//!
//! ## Single slot
//!
//! The receiving half of the answer queue sits behind an async mutex.
//! Holding that lock *is* holding the correlation slot: only one question
//! is outstanding at a time and every other caller queues on the lock.
//! Answers carry no vendor-side identifier, so correlation is positional.
//!
//! ## Timeouts and cancellation
//!
//! A caller that times out or whose request future is dropped releases the
//! slot with its question still in flight. The session still answers it;
//! the next slot holder recognises that answer by its older ticket and
//! discards it before waiting for its own.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Mutex};

use crate::domain::{BridgeError, SessionState};
use crate::ports::AnswerSource;

/// Sequence number of a question handed to the session.
pub type Ticket = u64;

/// A question on its way to the answer session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingQuestion {
    pub ticket: Ticket,
    pub text: String,
}

/// Outcome of one question, sent back by the answer session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerEnvelope {
    pub ticket: Ticket,
    pub outcome: Result<String, BridgeError>,
}

/// Request-side half of the bridge.
pub struct CorrelationBridge {
    questions: mpsc::Sender<PendingQuestion>,
    answers: Mutex<mpsc::UnboundedReceiver<AnswerEnvelope>>,
    state: watch::Receiver<SessionState>,
    next_ticket: AtomicU64,
    timeout: Duration,
}

/// Session-side half of the bridge, owned by the answer channel session.
pub struct SessionEndpoint {
    questions: mpsc::Receiver<PendingQuestion>,
    answers: mpsc::UnboundedSender<AnswerEnvelope>,
    state: watch::Sender<SessionState>,
}

impl CorrelationBridge {
    /// Creates a bridge and the endpoint to hand to the answer session.
    ///
    /// `timeout` bounds every `ask`, including the wait for the slot.
    pub fn new(timeout: Duration) -> (Self, SessionEndpoint) {
        let (question_tx, question_rx) = mpsc::channel(1);
        let (answer_tx, answer_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Disconnected);

        let bridge = Self {
            questions: question_tx,
            answers: Mutex::new(answer_rx),
            state: state_rx,
            next_ticket: AtomicU64::new(1),
            timeout,
        };
        let endpoint = SessionEndpoint {
            questions: question_rx,
            answers: answer_tx,
            state: state_tx,
        };
        (bridge, endpoint)
    }

    /// Current state of the answer session.
    pub fn session_state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch channel following the answer session's state.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Hands `question` to the answer session and waits for its answer.
    pub async fn ask(&self, question: impl Into<String>) -> Result<String, BridgeError> {
        match tokio::time::timeout(self.timeout, self.round_trip(question.into())).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    session_state = %self.session_state(),
                    "No answer within timeout, releasing correlation slot"
                );
                Err(BridgeError::timeout(self.timeout.as_secs()))
            }
        }
    }

    async fn round_trip(&self, text: String) -> Result<String, BridgeError> {
        let mut answers = self.answers.lock().await;

        let state = self.session_state();
        if !state.accepts_questions() {
            tracing::debug!(%state, "Rejecting question, answer session not connected");
            return Err(BridgeError::unavailable(state));
        }

        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        self.questions
            .send(PendingQuestion { ticket, text })
            .await
            .map_err(|_| BridgeError::SessionClosed)?;
        tracing::debug!(ticket, "Question handed to answer session");

        loop {
            let envelope = answers.recv().await.ok_or(BridgeError::SessionClosed)?;
            if envelope.ticket == ticket {
                return envelope.outcome;
            }
            tracing::debug!(
                ticket,
                stale_ticket = envelope.ticket,
                "Discarding answer of an abandoned question"
            );
        }
    }
}

#[async_trait]
impl AnswerSource for CorrelationBridge {
    async fn ask(&self, question: String) -> Result<String, BridgeError> {
        CorrelationBridge::ask(self, question).await
    }
}

impl SessionEndpoint {
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Publishes a state change. Repeating the current state is a no-op.
    pub fn set_state(&self, next: SessionState) {
        let current = self.state();
        if current == next {
            return;
        }
        if !current.can_transition_to(&next) {
            tracing::warn!(from = %current, to = %next, "Unexpected session state transition");
        }
        tracing::debug!(from = %current, to = %next, "Session state changed");
        self.state.send_replace(next);
    }

    /// Waits for the next question. Cancel-safe.
    ///
    /// Returns `None` once the bridge has been dropped.
    pub async fn recv_question(&mut self) -> Option<PendingQuestion> {
        self.questions.recv().await
    }

    /// Sends the outcome for `ticket` back to the bridge.
    pub fn deliver(&self, ticket: Ticket, outcome: Result<String, BridgeError>) {
        if self.answers.send(AnswerEnvelope { ticket, outcome }).is_err() {
            tracing::debug!(ticket, "Bridge dropped, discarding answer");
        }
    }

    /// Fails every question still waiting in the handoff queue.
    pub fn fail_queued(&mut self, error: BridgeError) -> usize {
        let mut failed = 0;
        while let Ok(question) = self.questions.try_recv() {
            self.deliver(question.ticket, Err(error.clone()));
            failed += 1;
        }
        if failed > 0 {
            tracing::debug!(failed, %error, "Failed queued questions");
        }
        failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ready_bridge(timeout: Duration) -> (Arc<CorrelationBridge>, SessionEndpoint) {
        let (bridge, endpoint) = CorrelationBridge::new(timeout);
        endpoint.set_state(SessionState::Connecting);
        endpoint.set_state(SessionState::Ready);
        (Arc::new(bridge), endpoint)
    }

    #[tokio::test]
    async fn ask_fails_fast_when_disconnected() {
        let (bridge, _endpoint) = CorrelationBridge::new(Duration::from_secs(30));

        let result = bridge.ask("hello").await;

        assert_eq!(
            result,
            Err(BridgeError::unavailable(SessionState::Disconnected))
        );
    }

    #[tokio::test]
    async fn ask_fails_fast_while_connecting() {
        let (bridge, endpoint) = CorrelationBridge::new(Duration::from_secs(30));
        endpoint.set_state(SessionState::Connecting);

        let result = bridge.ask("hello").await;

        assert_eq!(result, Err(BridgeError::unavailable(SessionState::Connecting)));
    }

    #[tokio::test]
    async fn ask_returns_the_answer_for_its_question() {
        let (bridge, mut endpoint) = ready_bridge(Duration::from_secs(5));

        let asker = {
            let bridge = bridge.clone();
            tokio::spawn(async move { bridge.ask("hello").await })
        };

        let question = endpoint.recv_question().await.unwrap();
        assert_eq!(question.text, "hello");
        endpoint.deliver(question.ticket, Ok("hi there".to_string()));

        assert_eq!(asker.await.unwrap(), Ok("hi there".to_string()));
    }

    #[tokio::test]
    async fn second_caller_waits_for_the_first_round_trip() {
        let (bridge, mut endpoint) = ready_bridge(Duration::from_secs(5));

        let first = {
            let bridge = bridge.clone();
            tokio::spawn(async move { bridge.ask("first").await })
        };
        let q1 = endpoint.recv_question().await.unwrap();

        let second = {
            let bridge = bridge.clone();
            tokio::spawn(async move { bridge.ask("second").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(
            endpoint.questions.try_recv().is_err(),
            "second question entered the slot before the first was answered"
        );

        endpoint.deliver(q1.ticket, Ok("answer one".to_string()));
        let q2 = endpoint.recv_question().await.unwrap();
        assert_eq!(q2.text, "second");
        endpoint.deliver(q2.ticket, Ok("answer two".to_string()));

        assert_eq!(first.await.unwrap(), Ok("answer one".to_string()));
        assert_eq!(second.await.unwrap(), Ok("answer two".to_string()));
    }

    #[tokio::test]
    async fn timeout_releases_the_slot_and_discards_the_late_answer() {
        let (bridge, mut endpoint) = ready_bridge(Duration::from_millis(100));

        let timed_out = bridge.ask("slow").await;
        assert!(matches!(timed_out, Err(BridgeError::SessionTimeout { .. })));

        let slow = endpoint.recv_question().await.unwrap();
        let next = {
            let bridge = bridge.clone();
            tokio::spawn(async move { bridge.ask("next").await })
        };
        endpoint.deliver(slow.ticket, Ok("late answer".to_string()));
        let q = endpoint.recv_question().await.unwrap();
        endpoint.deliver(q.ticket, Ok("fresh answer".to_string()));

        assert_eq!(next.await.unwrap(), Ok("fresh answer".to_string()));
    }

    #[tokio::test]
    async fn cancelled_caller_does_not_corrupt_the_next_correlation() {
        let (bridge, mut endpoint) = ready_bridge(Duration::from_secs(5));

        let cancelled = {
            let bridge = bridge.clone();
            tokio::spawn(async move { bridge.ask("abandoned").await })
        };
        let abandoned = endpoint.recv_question().await.unwrap();
        cancelled.abort();
        let _ = cancelled.await;

        let next = {
            let bridge = bridge.clone();
            tokio::spawn(async move { bridge.ask("next").await })
        };
        let q = endpoint.recv_question().await.unwrap();
        endpoint.deliver(abandoned.ticket, Ok("for nobody".to_string()));
        endpoint.deliver(q.ticket, Ok("for next".to_string()));

        assert_eq!(next.await.unwrap(), Ok("for next".to_string()));
    }

    #[tokio::test]
    async fn session_failures_reach_the_caller() {
        let (bridge, mut endpoint) = ready_bridge(Duration::from_secs(5));

        let asker = {
            let bridge = bridge.clone();
            tokio::spawn(async move { bridge.ask("hello").await })
        };
        let q = endpoint.recv_question().await.unwrap();
        endpoint.deliver(q.ticket, Err(BridgeError::answer_lost("vendor closed")));

        assert_eq!(
            asker.await.unwrap(),
            Err(BridgeError::answer_lost("vendor closed"))
        );
    }

    #[tokio::test]
    async fn dropped_endpoint_reports_session_closed() {
        let (bridge, endpoint) = ready_bridge(Duration::from_secs(5));
        drop(endpoint);

        let result = bridge.ask("hello").await;

        assert_eq!(result, Err(BridgeError::SessionClosed));
    }

    #[tokio::test]
    async fn fail_queued_drains_waiting_questions() {
        let (bridge, mut endpoint) = ready_bridge(Duration::from_secs(5));

        let asker = {
            let bridge = bridge.clone();
            tokio::spawn(async move { bridge.ask("queued").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        endpoint.set_state(SessionState::Disconnected);
        assert_eq!(
            endpoint.fail_queued(BridgeError::unavailable(SessionState::Disconnected)),
            1
        );

        assert_eq!(
            asker.await.unwrap(),
            Err(BridgeError::unavailable(SessionState::Disconnected))
        );
    }

    #[tokio::test]
    async fn state_changes_are_visible_to_subscribers() {
        let (bridge, endpoint) = CorrelationBridge::new(Duration::from_secs(1));
        let mut rx = bridge.subscribe_state();

        endpoint.set_state(SessionState::Connecting);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), SessionState::Connecting);
        assert_eq!(bridge.session_state(), SessionState::Connecting);
    }
}

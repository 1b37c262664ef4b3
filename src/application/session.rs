//! AnswerChannelSession - the vendor side of the correlation bridge.
//!
//! Owns the websocket conversation with the AI vendor and turns the
//! bridge's one-question/one-answer contract into the vendor's framed,
//! multi-chunk protocol. The `SessionDriver` runs it on its own task for
//! the lifetime of the process.
//!
//! ## Loop
//!
//! ```text
//! Disconnected ─► Connecting ─► Ready ◄──────────────┐
//!     ▲               │           │ question sent     │ final chunk
//!     │  failed       │           ▼                   │
//!     └───────────────┘     AwaitingAnswer ───────────┘
//!     ▲                           │
//!     └──── connection dropped ───┘
//! ```
//!
//! ## Failure handling
//!
//! - the question awaiting an answer when the connection drops is failed
//!   with `AnswerLost`
//! - questions still queued when the session goes `Disconnected` are failed
//!   with `SessionUnavailable`
//! - an answer that does not complete within `answer_timeout` is failed
//!   with `AnswerLost` and the connection is recycled
//! - a vendor closing an idle connection that already served an answer
//!   (Spark closes after every final frame) is reconnected immediately
//!   without leaving `Ready`; queued questions wait for the new connection
//! - a question sent on such a used connection just as the vendor closes it
//!   (no chunk of its answer arrived) is resent once on the fresh connection
//! - any other failure goes `Disconnected` and waits for the reconnect backoff

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::domain::{BridgeError, SessionState};
use crate::ports::{VendorConnection, VendorConnector, VendorError};

use super::bridge::{PendingQuestion, SessionEndpoint, Ticket};

/// An idle close of a connection younger than this, with no answer served, counts as a failure.
const MIN_HEALTHY_CONNECTION: Duration = Duration::from_secs(5);

/// Timing configuration for the answer session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Delay before the first reconnect attempt; doubles on each failure.
    pub reconnect_initial: Duration,

    /// Upper bound for the reconnect delay.
    pub reconnect_max: Duration,

    /// Time allowed for a connect + handshake.
    pub connect_timeout: Duration,

    /// Time allowed between sending a question and its final chunk.
    pub answer_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_initial: Duration::from_millis(500),
            reconnect_max: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            answer_timeout: Duration::from_secs(30),
        }
    }
}

impl SessionConfig {
    pub fn with_reconnect_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.reconnect_initial = initial;
        self.reconnect_max = max;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_answer_timeout(mut self, timeout: Duration) -> Self {
        self.answer_timeout = timeout;
        self
    }

    /// Backoff before reconnect attempt number `failures` (1-based).
    pub fn reconnect_delay(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(16);
        self.reconnect_initial
            .saturating_mul(1u32 << exponent)
            .min(self.reconnect_max)
    }
}

/// Why a conversation on one connection ended.
enum EndReason {
    Shutdown,
    Dropped(String),
}

struct ConversationEnd {
    reason: EndReason,
    /// Question whose answer can no longer arrive.
    lost: Option<Ticket>,
    /// Question to resend on a fresh connection.
    retry: Option<PendingQuestion>,
    /// The connection served an answer or stayed open long enough to count as working.
    healthy: bool,
}

struct InFlight {
    question: PendingQuestion,
    answer: String,
    chunks: usize,
    deadline: Instant,
}

/// The answer channel session.
pub struct AnswerChannelSession {
    connector: Arc<dyn VendorConnector>,
    endpoint: SessionEndpoint,
    config: SessionConfig,
}

impl AnswerChannelSession {
    pub fn new(connector: Arc<dyn VendorConnector>, endpoint: SessionEndpoint) -> Self {
        Self::with_config(connector, endpoint, SessionConfig::default())
    }

    pub fn with_config(
        connector: Arc<dyn VendorConnector>,
        endpoint: SessionEndpoint,
        config: SessionConfig,
    ) -> Self {
        Self {
            connector,
            endpoint,
            config,
        }
    }

    /// Runs the connect/converse/reconnect loop until shutdown is signalled.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut failures: u32 = 0;
        let mut recycling = false;
        let mut carried: Option<PendingQuestion> = None;

        loop {
            if *shutdown.borrow() {
                break;
            }

            if !recycling {
                self.endpoint.set_state(SessionState::Connecting);
            }
            let connected = tokio::select! {
                _ = wait_for_shutdown(&mut shutdown) => break,
                result = tokio::time::timeout(self.config.connect_timeout, self.connector.connect()) => result,
            };

            let delay = match connected {
                Ok(Ok(connection)) => {
                    failures = 0;
                    if recycling {
                        tracing::debug!("Answer session reconnected");
                    } else {
                        tracing::info!("Answer session ready");
                    }
                    recycling = false;
                    self.endpoint.set_state(SessionState::Ready);

                    let end = self.converse(connection, carried.take(), &mut shutdown).await;
                    if let Some(question) = end.retry {
                        tracing::debug!(
                            ticket = question.ticket,
                            "Connection closed before answering, resending on a fresh connection"
                        );
                        carried = Some(question);
                        recycling = true;
                        continue;
                    }

                    match (end.reason, end.lost) {
                        (EndReason::Shutdown, lost) => {
                            self.endpoint.set_state(SessionState::Disconnected);
                            if let Some(ticket) = lost {
                                self.endpoint.deliver(ticket, Err(BridgeError::SessionClosed));
                            }
                            break;
                        }
                        (EndReason::Dropped(reason), Some(ticket)) => {
                            self.endpoint.set_state(SessionState::Disconnected);
                            tracing::warn!(ticket, %reason, "Connection dropped while awaiting answer");
                            self.endpoint.deliver(ticket, Err(BridgeError::answer_lost(reason)));
                            failures = 1;
                            self.config.reconnect_delay(failures)
                        }
                        (EndReason::Dropped(reason), None) if end.healthy => {
                            tracing::debug!(%reason, "Idle connection closed, reconnecting");
                            recycling = true;
                            continue;
                        }
                        (EndReason::Dropped(reason), None) => {
                            self.endpoint.set_state(SessionState::Disconnected);
                            tracing::warn!(%reason, "Connection closed before serving any answer");
                            failures = 1;
                            self.config.reconnect_delay(failures)
                        }
                    }
                }
                Ok(Err(e)) => {
                    failures = failures.saturating_add(1);
                    recycling = false;
                    tracing::warn!(error = %e, failures, "Answer session connect failed");
                    self.endpoint.set_state(SessionState::Disconnected);
                    if let Some(question) = carried.take() {
                        let reason = format!("reconnect failed: {e}");
                        self.endpoint.deliver(question.ticket, Err(BridgeError::answer_lost(reason)));
                    }
                    self.config.reconnect_delay(failures)
                }
                Err(_) => {
                    failures = failures.saturating_add(1);
                    recycling = false;
                    let timeout_ms = self.config.connect_timeout.as_millis() as u64;
                    tracing::warn!(timeout_ms, failures, "Answer session connect timed out");
                    self.endpoint.set_state(SessionState::Disconnected);
                    if let Some(question) = carried.take() {
                        let reason = format!("reconnect timed out after {timeout_ms}ms");
                        self.endpoint.deliver(question.ticket, Err(BridgeError::answer_lost(reason)));
                    }
                    self.config.reconnect_delay(failures)
                }
            };

            self.endpoint
                .fail_queued(BridgeError::unavailable(SessionState::Disconnected));

            if !delay.is_zero() {
                tracing::debug!(delay_ms = delay.as_millis() as u64, "Waiting before reconnect");
                tokio::select! {
                    _ = wait_for_shutdown(&mut shutdown) => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        self.endpoint.set_state(SessionState::Disconnected);
        if let Some(question) = carried.take() {
            self.endpoint.deliver(question.ticket, Err(BridgeError::SessionClosed));
        }
        self.endpoint.fail_queued(BridgeError::SessionClosed);
        tracing::info!("Answer session stopped");
    }

    async fn converse(
        &mut self,
        mut connection: Box<dyn VendorConnection>,
        carried: Option<PendingQuestion>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> ConversationEnd {
        let opened_at = Instant::now();
        let mut answered: usize = 0;
        let mut pending: Option<InFlight> = None;

        // `resendable`: the drop looks like the vendor closing a used connection.
        let end = |reason: EndReason, pending: Option<InFlight>, answered: usize, resendable: bool| {
            let healthy = answered > 0 || opened_at.elapsed() >= MIN_HEALTHY_CONNECTION;
            match pending {
                Some(in_flight)
                    if resendable
                        && answered > 0
                        && in_flight.chunks == 0
                        && matches!(reason, EndReason::Dropped(_)) =>
                {
                    ConversationEnd {
                        reason,
                        lost: None,
                        retry: Some(in_flight.question),
                        healthy,
                    }
                }
                pending => ConversationEnd {
                    reason,
                    lost: pending.map(|p| p.question.ticket),
                    retry: None,
                    healthy,
                },
            }
        };

        if let Some(question) = carried {
            match self.send(connection.as_mut(), question).await {
                Ok(in_flight) => pending = Some(in_flight),
                Err((in_flight, reason)) => {
                    return end(EndReason::Dropped(reason), Some(in_flight), answered, false);
                }
            }
        }

        loop {
            // Only polled while an answer is pending.
            let deadline = pending
                .as_ref()
                .map(|p| p.deadline)
                .unwrap_or_else(|| Instant::now() + self.config.answer_timeout);

            tokio::select! {
                biased;

                _ = wait_for_shutdown(shutdown) => {
                    return end(EndReason::Shutdown, pending, answered, false);
                }

                chunk = connection.next_chunk() => match chunk {
                    Some(Ok(chunk)) => {
                        let Some(in_flight) = pending.as_mut() else {
                            tracing::debug!("Discarding answer chunk with no question pending");
                            continue;
                        };
                        in_flight.answer.push_str(&chunk.content);
                        in_flight.chunks += 1;

                        if chunk.is_final {
                            if let Some(done) = pending.take() {
                                tracing::debug!(
                                    ticket = done.question.ticket,
                                    chunks = done.chunks,
                                    answer_len = done.answer.len(),
                                    "Answer assembled"
                                );
                                answered += 1;
                                self.endpoint.set_state(SessionState::Ready);
                                self.endpoint.deliver(done.question.ticket, Ok(done.answer));
                            }
                        }
                    }
                    Some(Err(e)) => {
                        let resendable = matches!(e, VendorError::Transport(_));
                        return end(EndReason::Dropped(e.to_string()), pending, answered, resendable);
                    }
                    None => {
                        let reason = "vendor closed the connection".to_string();
                        return end(EndReason::Dropped(reason), pending, answered, true);
                    }
                },

                _ = tokio::time::sleep_until(deadline), if pending.is_some() => {
                    let reason = format!(
                        "no answer from vendor within {}ms",
                        self.config.answer_timeout.as_millis()
                    );
                    return end(EndReason::Dropped(reason), pending, answered, false);
                }

                question = self.endpoint.recv_question(), if pending.is_none() => {
                    let Some(question) = question else {
                        tracing::debug!("Bridge dropped, stopping conversation");
                        return end(EndReason::Shutdown, None, answered, false);
                    };

                    match self.send(connection.as_mut(), question).await {
                        Ok(in_flight) => pending = Some(in_flight),
                        Err((in_flight, reason)) => {
                            return end(EndReason::Dropped(reason), Some(in_flight), answered, true);
                        }
                    }
                }
            }
        }
    }

    async fn send(
        &self,
        connection: &mut dyn VendorConnection,
        question: PendingQuestion,
    ) -> Result<InFlight, (InFlight, String)> {
        let in_flight = InFlight {
            deadline: Instant::now() + self.config.answer_timeout,
            question,
            answer: String::new(),
            chunks: 0,
        };

        match connection.send_question(&in_flight.question.text).await {
            Ok(()) => {
                tracing::debug!(ticket = in_flight.question.ticket, "Question sent to vendor");
                self.endpoint.set_state(SessionState::AwaitingAnswer);
                Ok(in_flight)
            }
            Err(e) => Err((in_flight, e.to_string())),
        }
    }
}

/// Resolves once shutdown is signalled or the signal sender is gone.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Runs an `AnswerChannelSession` on its own task.
pub struct SessionDriver {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl SessionDriver {
    /// Spawns the session loop.
    pub fn spawn(session: AnswerChannelSession) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(session.run(shutdown_rx));
        Self { handle, shutdown }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signals shutdown and waits for the session loop to exit.
    pub async fn shutdown(self) {
        self.shutdown.send_replace(true);
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "Session driver task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::{MockReply, MockVendorConnector};
    use crate::application::bridge::CorrelationBridge;
    use crate::ports::AnswerChunk;

    fn fast_config() -> SessionConfig {
        SessionConfig::default()
            .with_reconnect_backoff(Duration::from_millis(20), Duration::from_millis(80))
            .with_connect_timeout(Duration::from_millis(500))
            .with_answer_timeout(Duration::from_secs(2))
    }

    fn start(
        connector: MockVendorConnector,
        bridge_timeout: Duration,
        config: SessionConfig,
    ) -> (Arc<CorrelationBridge>, SessionDriver) {
        let (bridge, endpoint) = CorrelationBridge::new(bridge_timeout);
        let session = AnswerChannelSession::with_config(Arc::new(connector), endpoint, config);
        (Arc::new(bridge), SessionDriver::spawn(session))
    }

    async fn wait_for(bridge: &CorrelationBridge, state: SessionState) {
        let mut rx = bridge.subscribe_state();
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| *s == state))
            .await
            .unwrap_or_else(|_| panic!("session never reached {state}"))
            .unwrap();
    }

    #[test]
    fn reconnect_delay_doubles_and_caps() {
        let config = SessionConfig::default()
            .with_reconnect_backoff(Duration::from_millis(100), Duration::from_millis(700));
        assert_eq!(config.reconnect_delay(1), Duration::from_millis(100));
        assert_eq!(config.reconnect_delay(2), Duration::from_millis(200));
        assert_eq!(config.reconnect_delay(3), Duration::from_millis(400));
        assert_eq!(config.reconnect_delay(4), Duration::from_millis(700));
        assert_eq!(config.reconnect_delay(u32::MAX), Duration::from_millis(700));
    }

    #[tokio::test]
    async fn assembles_chunks_into_one_answer() {
        let connector = MockVendorConnector::new().with_reply(MockReply::chunks(["hi", " there"]));
        let (bridge, driver) = start(connector.clone(), Duration::from_secs(2), fast_config());
        wait_for(&bridge, SessionState::Ready).await;

        let answer = bridge.ask("hello").await;

        assert_eq!(answer, Ok("hi there".to_string()));
        assert_eq!(connector.questions(), vec!["hello".to_string()]);
        driver.shutdown().await;
    }

    #[tokio::test]
    async fn serves_consecutive_questions_in_order() {
        let connector = MockVendorConnector::new()
            .with_reply(MockReply::chunks(["one"]))
            .with_reply(MockReply::chunks(["two"]));
        let (bridge, driver) = start(connector, Duration::from_secs(2), fast_config());
        wait_for(&bridge, SessionState::Ready).await;

        let (a, b) = tokio::join!(bridge.ask("first"), bridge.ask("second"));

        let mut answers = vec![a.unwrap(), b.unwrap()];
        answers.sort();
        assert_eq!(answers, vec!["one".to_string(), "two".to_string()]);
        driver.shutdown().await;
    }

    #[tokio::test]
    async fn concurrent_callers_get_their_own_answers() {
        let connector = MockVendorConnector::new().echoing().with_chunk_delay(Duration::from_millis(10));
        let (bridge, driver) = start(connector, Duration::from_secs(5), fast_config());
        wait_for(&bridge, SessionState::Ready).await;

        let mut tasks = Vec::new();
        for i in 0..5 {
            let bridge = bridge.clone();
            tasks.push(tokio::spawn(async move {
                let question = format!("question {i}");
                let answer = bridge.ask(question.clone()).await.unwrap();
                (question, answer)
            }));
        }

        for task in tasks {
            let (question, answer) = task.await.unwrap();
            assert_eq!(answer, format!("echo: {question}"));
        }
        driver.shutdown().await;
    }

    #[tokio::test]
    async fn retries_failed_connects_with_backoff() {
        let connector = MockVendorConnector::new()
            .with_connect_failures(2)
            .with_reply(MockReply::chunks(["finally"]));
        let (bridge, driver) = start(connector.clone(), Duration::from_secs(2), fast_config());

        wait_for(&bridge, SessionState::Ready).await;
        assert_eq!(connector.connect_attempts(), 3);
        assert_eq!(bridge.ask("hello").await, Ok("finally".to_string()));
        driver.shutdown().await;
    }

    #[tokio::test]
    async fn disconnect_while_awaiting_answer_fails_the_caller_and_reconnects() {
        let connector = MockVendorConnector::new()
            .with_reply(MockReply::Disconnect)
            .with_reply(MockReply::chunks(["back online"]));
        let (bridge, driver) = start(connector.clone(), Duration::from_secs(2), fast_config());
        wait_for(&bridge, SessionState::Ready).await;

        let mut states = bridge.subscribe_state();
        let lost = bridge.ask("hello").await;
        assert!(matches!(lost, Err(BridgeError::AnswerLost { .. })), "{lost:?}");

        tokio::time::timeout(
            Duration::from_secs(2),
            states.wait_for(|s| *s == SessionState::Disconnected),
        )
        .await
        .unwrap()
        .unwrap();
        wait_for(&bridge, SessionState::Ready).await;

        assert_eq!(connector.connect_attempts(), 2);
        assert_eq!(bridge.ask("again").await, Ok("back online".to_string()));
        driver.shutdown().await;
    }

    #[tokio::test]
    async fn vendor_error_frame_fails_the_caller() {
        let connector = MockVendorConnector::new().with_reply(MockReply::Error(VendorError::Rejected {
            code: 10013,
            message: "input content audit failed".to_string(),
        }));
        let (bridge, driver) = start(connector, Duration::from_secs(2), fast_config());
        wait_for(&bridge, SessionState::Ready).await;

        let result = bridge.ask("hello").await;

        match result {
            Err(BridgeError::AnswerLost { reason }) => assert!(reason.contains("10013"), "{reason}"),
            other => panic!("expected AnswerLost, got {other:?}"),
        }
        driver.shutdown().await;
    }

    #[tokio::test]
    async fn idle_close_after_answer_reconnects_without_failing_anyone() {
        let connector = MockVendorConnector::new()
            .closing_after_answer()
            .with_reply(MockReply::chunks(["first"]))
            .with_reply(MockReply::chunks(["second"]));
        let (bridge, driver) = start(connector.clone(), Duration::from_secs(2), fast_config());
        wait_for(&bridge, SessionState::Ready).await;

        assert_eq!(bridge.ask("one").await, Ok("first".to_string()));
        assert_eq!(bridge.ask("two").await, Ok("second".to_string()));
        assert!(connector.connect_attempts() >= 2);
        driver.shutdown().await;
    }

    #[tokio::test]
    async fn question_racing_a_vendor_close_is_resent() {
        let connector = MockVendorConnector::new()
            .closing_after_answer()
            .with_chunk_delay(Duration::from_millis(30))
            .with_reply(MockReply::chunks(["first"]))
            .with_reply(MockReply::chunks(["second"]));
        let (bridge, driver) = start(connector.clone(), Duration::from_secs(2), fast_config());
        wait_for(&bridge, SessionState::Ready).await;

        assert_eq!(bridge.ask("one").await, Ok("first".to_string()));
        // Sent while the first connection's close is still in flight.
        assert_eq!(bridge.ask("two").await, Ok("second".to_string()));

        assert_eq!(connector.questions(), vec!["one".to_string(), "two".to_string()]);
        assert_eq!(connector.connect_attempts(), 2);
        driver.shutdown().await;
    }

    #[tokio::test]
    async fn stalled_vendor_times_out_caller_and_session_recovers() {
        let connector = MockVendorConnector::new()
            .with_reply(MockReply::Silence)
            .with_reply(MockReply::chunks(["recovered"]));
        let config = fast_config().with_answer_timeout(Duration::from_millis(300));
        let (bridge, driver) = start(connector, Duration::from_millis(100), config);
        wait_for(&bridge, SessionState::Ready).await;

        let mut states = bridge.subscribe_state();
        let stalled = bridge.ask("anyone there?").await;
        assert!(matches!(stalled, Err(BridgeError::SessionTimeout { .. })), "{stalled:?}");

        tokio::time::timeout(
            Duration::from_secs(2),
            states.wait_for(|s| *s == SessionState::Disconnected),
        )
        .await
        .unwrap()
        .unwrap();
        wait_for(&bridge, SessionState::Ready).await;

        assert_eq!(bridge.ask("hello?").await, Ok("recovered".to_string()));
        driver.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_fails_the_pending_question() {
        let connector = MockVendorConnector::new().with_reply(MockReply::Silence);
        let (bridge, driver) = start(connector, Duration::from_secs(5), fast_config());
        wait_for(&bridge, SessionState::Ready).await;

        let asker = {
            let bridge = bridge.clone();
            tokio::spawn(async move { bridge.ask("hello").await })
        };
        wait_for(&bridge, SessionState::AwaitingAnswer).await;
        driver.shutdown().await;

        assert_eq!(asker.await.unwrap(), Err(BridgeError::SessionClosed));
        assert_eq!(bridge.session_state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn unsolicited_chunks_are_ignored() {
        let connector = MockVendorConnector::new()
            .with_unsolicited(AnswerChunk::last("stray"))
            .with_reply(MockReply::chunks(["real"]));
        let (bridge, driver) = start(connector, Duration::from_secs(2), fast_config());
        wait_for(&bridge, SessionState::Ready).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(bridge.ask("hello").await, Ok("real".to_string()));
        driver.shutdown().await;
    }
}

//! Route configuration for the callback endpoint.

use axum::routing::{get, post};
use axum::Router;

use super::handlers::{handle_callback, health, WebhookAppState};

/// Create the callback router.
///
/// # Routes
/// - `POST /` - Lark callbacks (URL verification and events)
/// - `GET /health` - Liveness and answer session state
pub fn webhook_router(state: WebhookAppState) -> Router {
    Router::new()
        .route("/", post(handle_callback))
        .route("/health", get(health))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use secrecy::Secret;
    use serde_json::{json, Value};
    use tokio::sync::watch;
    use tower::ServiceExt;

    use crate::adapters::events::InMemoryProcessedEventStore;
    use crate::adapters::lark::MockChatPlatform;
    use crate::application::WebhookDispatcher;
    use crate::domain::{BridgeError, SessionState};
    use crate::ports::AnswerSource;

    struct FixedAnswer(Result<String, BridgeError>);

    #[async_trait::async_trait]
    impl AnswerSource for FixedAnswer {
        async fn ask(&self, _question: String) -> Result<String, BridgeError> {
            self.0.clone()
        }
    }

    fn app(answer: Result<String, BridgeError>, chat: MockChatPlatform) -> Router {
        let dispatcher = WebhookDispatcher::new(
            Arc::new(FixedAnswer(answer)),
            Arc::new(chat),
            Arc::new(InMemoryProcessedEventStore::new()),
            Secret::new("tok".to_string()),
        );
        let (_tx, session_state) = watch::channel(SessionState::Ready);
        webhook_router(WebhookAppState {
            dispatcher: Arc::new(dispatcher),
            session_state,
        })
    }

    fn post_json(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn message_event() -> Value {
        json!({
            "schema": "2.0",
            "header": {"event_id": "ev-1", "event_type": "im.message.receive_v1", "token": "tok"},
            "event": {
                "sender": {"sender_id": {"open_id": "u123"}},
                "message": {"message_type": "text", "content": "{\"text\":\"hello\"}"}
            }
        })
    }

    #[tokio::test]
    async fn verification_returns_challenge() {
        let response = app(Ok("unused".into()), MockChatPlatform::new())
            .oneshot(post_json(json!({"type": "url_verification", "token": "tok", "challenge": "xyz"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"challenge": "xyz"}));
    }

    #[tokio::test]
    async fn bad_token_is_401_with_message() {
        let response = app(Ok("unused".into()), MockChatPlatform::new())
            .oneshot(post_json(json!({"type": "url_verification", "token": "wrong", "challenge": "xyz"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["message"], "VERIFICATION_TOKEN is invalid");
    }

    #[tokio::test]
    async fn message_event_is_acknowledged_with_empty_object() {
        let chat = MockChatPlatform::new();
        let response = app(Ok("hi there".into()), chat.clone())
            .oneshot(post_json(message_event()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({}));
        assert_eq!(chat.sent()[0].content, "{\"text\": \"hi there\"}");
    }

    #[tokio::test]
    async fn invalid_json_is_400() {
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from("not json"))
            .unwrap();

        let response = app(Ok("unused".into()), MockChatPlatform::new())
            .oneshot(request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn bridge_timeout_is_504() {
        let response = app(Err(BridgeError::timeout(30)), MockChatPlatform::new())
            .oneshot(post_json(message_event()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        let body = body_json(response).await;
        assert_eq!(body["error_code"], "session_timeout");
    }

    #[tokio::test]
    async fn unavailable_session_is_503() {
        let response = app(
            Err(BridgeError::unavailable(SessionState::Disconnected)),
            MockChatPlatform::new(),
        )
        .oneshot(post_json(message_event()))
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn health_reports_session_state() {
        let response = app(Ok("unused".into()), MockChatPlatform::new())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"status": "ok", "session": "ready"}));
    }
}

//! HTTP handlers for the Lark callback endpoint.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Json, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio::sync::watch;

use crate::application::{DispatchOutcome, HandleCallbackCommand, WebhookDispatcher};
use crate::domain::signature::{NONCE_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::domain::{BridgeError, DispatchError, SessionState, SignatureHeaders};

use super::dto::{AckResponse, ChallengeResponse, ErrorResponse, HealthResponse};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state for the callback routes.
#[derive(Clone)]
pub struct WebhookAppState {
    pub dispatcher: Arc<WebhookDispatcher>,
    /// Current answer session state, for `/health`.
    pub session_state: watch::Receiver<SessionState>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST / - Handle a Lark callback
pub async fn handle_callback(
    State(state): State<WebhookAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, WebhookApiError> {
    let cmd = HandleCallbackCommand {
        body: body.to_vec(),
        signature: signature_headers(&headers),
    };

    match state.dispatcher.handle(cmd).await {
        Ok(DispatchOutcome::Challenge(challenge)) => {
            Ok(Json(ChallengeResponse { challenge }).into_response())
        }
        Ok(_) => Ok(Json(AckResponse::default()).into_response()),
        Err(error) => Err(WebhookApiError::new(error, &body)),
    }
}

/// GET /health - Liveness and answer session state
pub async fn health(State(state): State<WebhookAppState>) -> impl IntoResponse {
    let session = *state.session_state.borrow();
    Json(HealthResponse::ok(session))
}

fn signature_headers(headers: &HeaderMap) -> Option<SignatureHeaders> {
    let get = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    Some(SignatureHeaders {
        timestamp: get(TIMESTAMP_HEADER)?,
        nonce: get(NONCE_HEADER)?,
        signature: get(SIGNATURE_HEADER)?,
    })
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error wrapper that converts `DispatchError` to HTTP responses.
#[derive(Debug)]
pub struct WebhookApiError {
    error: DispatchError,
    event_type: Option<String>,
    sender: Option<String>,
}

impl WebhookApiError {
    /// Wraps `error`, noting what the failed request was about for the log line.
    fn new(error: DispatchError, body: &[u8]) -> Self {
        let raw: Option<serde_json::Value> = serde_json::from_slice(body).ok();
        let field = |pointer: &str| {
            raw.as_ref()
                .and_then(|v| v.pointer(pointer))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };

        Self {
            event_type: field("/header/event_type").or_else(|| field("/type")),
            sender: field("/event/sender/sender_id/open_id"),
            error,
        }
    }

    pub fn status(&self) -> StatusCode {
        match &self.error {
            DispatchError::Authentication(_) => StatusCode::UNAUTHORIZED,
            DispatchError::MalformedEvent(_) => StatusCode::BAD_REQUEST,
            DispatchError::Upstream { status, .. } => status
                .and_then(|s| StatusCode::from_u16(s).ok())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            DispatchError::Bridge(BridgeError::SessionTimeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            DispatchError::Bridge(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<DispatchError> for WebhookApiError {
    fn from(error: DispatchError) -> Self {
        Self {
            error,
            event_type: None,
            sender: None,
        }
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let event_type = self.event_type.as_deref().unwrap_or("unknown");
        let sender = self.sender.as_deref().unwrap_or("-");

        if status.is_server_error() {
            tracing::error!(
                status = status.as_u16(),
                kind = self.error.kind(),
                event_type,
                sender,
                error = %self.error,
                "Callback failed"
            );
        } else {
            tracing::warn!(
                status = status.as_u16(),
                kind = self.error.kind(),
                event_type,
                sender,
                error = %self.error,
                "Callback rejected"
            );
        }

        let body = ErrorResponse::new(self.error.kind(), self.error.to_string());
        (status, Json(body)).into_response()
    }
}

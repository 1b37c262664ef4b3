//! HTTP adapter for the Lark callback endpoint.
//!
//! - `POST /` - URL verification and event callbacks
//! - `GET /health` - Liveness and answer session state

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::{WebhookApiError, WebhookAppState};
pub use routes::webhook_router;

//! HTTP adapters - the inbound callback server.

pub mod webhook;

pub use webhook::{webhook_router, WebhookAppState};

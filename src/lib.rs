//! Lark Spark Bridge - a Lark (Feishu) bot answered by the iFlytek Spark chat API.
//!
//! Lark delivers each user message to an HTTP callback; Spark answers over a
//! long-lived websocket. The correlation bridge joins the two: every webhook
//! request asks one question, waits (bounded) for its answer, and the reply
//! is posted back to the sender through the Lark message API.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

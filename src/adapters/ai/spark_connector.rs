//! Spark Connector - `VendorConnector` over the Spark chat websocket.
//!
//! Each `connect` signs a fresh URL and completes the websocket handshake.
//! Spark answers one question per connection and closes it after the final
//! frame; the answer session reconnects as needed.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use secrecy::Secret;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

use crate::ports::{AnswerChunk, VendorConnection, VendorConnector, VendorError};

use super::spark_auth::SparkUrlSigner;
use super::spark_frames::{decode_response, ChatParameters, RequestFrame};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Configuration for the Spark connector.
#[derive(Debug, Clone)]
pub struct SparkConfig {
    pub app_id: String,
    api_key: Secret<String>,
    api_secret: Secret<String>,
    /// Websocket endpoint (default: wss://spark-api.xf-yun.com/v1.1/chat).
    pub ws_url: String,
    pub chat: ChatParameters,
}

impl SparkConfig {
    pub fn new(
        app_id: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            api_key: Secret::new(api_key.into()),
            api_secret: Secret::new(api_secret.into()),
            ws_url: "wss://spark-api.xf-yun.com/v1.1/chat".to_string(),
            chat: ChatParameters::default(),
        }
    }

    pub fn with_ws_url(mut self, url: impl Into<String>) -> Self {
        self.ws_url = url.into();
        self
    }

    pub fn with_chat_parameters(mut self, chat: ChatParameters) -> Self {
        self.chat = chat;
        self
    }
}

/// Spark websocket connector.
pub struct SparkConnector {
    app_id: String,
    chat: ChatParameters,
    signer: SparkUrlSigner,
}

impl SparkConnector {
    pub fn new(config: SparkConfig) -> Result<Self, VendorError> {
        let signer = SparkUrlSigner::new(&config.ws_url, config.api_key, config.api_secret)?;
        Ok(Self {
            app_id: config.app_id,
            chat: config.chat,
            signer,
        })
    }
}

#[async_trait]
impl VendorConnector for SparkConnector {
    async fn connect(&self) -> Result<Box<dyn VendorConnection>, VendorError> {
        let url = self.signer.signed_url()?;
        let (ws, response) = connect_async(url.as_str())
            .await
            .map_err(|e| VendorError::Connect(e.to_string()))?;

        tracing::debug!(status = %response.status(), "Spark websocket connected");

        Ok(Box::new(SparkConnection {
            ws,
            app_id: self.app_id.clone(),
            chat: self.chat.clone(),
            uid: Uuid::new_v4().simple().to_string(),
            closed: false,
        }))
    }
}

/// One open Spark websocket.
struct SparkConnection {
    ws: WsStream,
    app_id: String,
    chat: ChatParameters,
    uid: String,
    closed: bool,
}

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
impl VendorConnection for SparkConnection {
    async fn send_question(&mut self, question: &str) -> Result<(), VendorError> {
        let frame = RequestFrame::question(&self.app_id, &self.uid, &self.chat, question).to_json()?;

        tokio::time::timeout(SEND_TIMEOUT, self.ws.send(Message::Text(frame)))
            .await
            .map_err(|_| VendorError::Transport("send timed out".to_string()))?
            .map_err(|e| VendorError::Transport(e.to_string()))
    }

    async fn next_chunk(&mut self) -> Option<Result<AnswerChunk, VendorError>> {
        if self.closed {
            return None;
        }

        // `StreamExt::next` is cancel-safe; nothing is buffered here between polls.
        while let Some(message) = self.ws.next().await {
            match message {
                Ok(Message::Text(text)) => return Some(decode_response(&text)),
                Ok(Message::Close(frame)) => {
                    tracing::debug!(?frame, "Spark closed the websocket");
                    self.closed = true;
                    return None;
                }
                Ok(Message::Binary(bytes)) => {
                    tracing::debug!(len = bytes.len(), "Ignoring binary frame");
                }
                Ok(_) => {}
                Err(e) => {
                    self.closed = true;
                    return Some(Err(VendorError::Transport(e.to_string())));
                }
            }
        }

        self.closed = true;
        None
    }
}

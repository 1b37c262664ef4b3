//! WebhookDispatcher - Handler for Lark callbacks.
//!
//! Verifies and classifies each callback, answers text messages through the
//! correlation bridge and posts the answer back to the sender.

use std::sync::Arc;

use secrecy::{ExposeSecret, Secret};

use crate::domain::signature::constant_time_compare;
use crate::domain::{
    DispatchError, InboundEvent, LarkSignatureVerifier, MessageReceive, SignatureHeaders,
    TextContent, UrlVerification,
};
use crate::ports::{AnswerSource, ChatPlatform, ProcessedEventStore};

/// Command to handle one callback.
#[derive(Debug, Clone)]
pub struct HandleCallbackCommand {
    /// Raw request body.
    pub body: Vec<u8>,
    /// Signature headers, if the request carried all three.
    pub signature: Option<SignatureHeaders>,
}

/// Result of callback handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// URL verification passed; echo the challenge.
    Challenge(String),
    /// Question answered and reply sent.
    Replied { open_id: String },
    /// Message of a type we do not answer.
    Ignored { message_type: String },
    /// Redelivery of an event already claimed.
    Duplicate { event_id: String },
    /// Event acknowledged but no action taken.
    Acknowledged { event_type: String },
}

/// Handler for Lark callbacks.
pub struct WebhookDispatcher {
    answers: Arc<dyn AnswerSource>,
    chat: Arc<dyn ChatPlatform>,
    processed: Arc<dyn ProcessedEventStore>,
    verification_token: Secret<String>,
    signature_verifier: Option<LarkSignatureVerifier>,
}

impl WebhookDispatcher {
    pub fn new(
        answers: Arc<dyn AnswerSource>,
        chat: Arc<dyn ChatPlatform>,
        processed: Arc<dyn ProcessedEventStore>,
        verification_token: Secret<String>,
    ) -> Self {
        Self {
            answers,
            chat,
            processed,
            verification_token,
            signature_verifier: None,
        }
    }

    /// Requires signed requests.
    pub fn with_signature_verifier(mut self, verifier: LarkSignatureVerifier) -> Self {
        self.signature_verifier = Some(verifier);
        self
    }

    pub async fn handle(&self, cmd: HandleCallbackCommand) -> Result<DispatchOutcome, DispatchError> {
        // 1. Check the request signature when an encrypt key is configured
        if let Some(verifier) = &self.signature_verifier {
            verifier
                .verify(cmd.signature.as_ref(), &cmd.body)
                .map_err(|e| DispatchError::authentication(format!("signature check failed: {e}")))?;
        }

        // 2. Classify and route
        match InboundEvent::from_slice(&cmd.body)? {
            InboundEvent::UrlVerification(verification) => self.handle_verification(verification),
            InboundEvent::MessageReceive(message) => self.handle_message(message).await,
            InboundEvent::Other(header) => {
                tracing::debug!(event_type = %header.event_type, "Acknowledging unhandled event type");
                Ok(DispatchOutcome::Acknowledged {
                    event_type: header.event_type,
                })
            }
        }
    }

    fn handle_verification(&self, verification: UrlVerification) -> Result<DispatchOutcome, DispatchError> {
        self.check_token(&verification.token)?;
        tracing::info!("URL verification challenge accepted");
        Ok(DispatchOutcome::Challenge(verification.challenge))
    }

    async fn handle_message(&self, message: MessageReceive) -> Result<DispatchOutcome, DispatchError> {
        if let Some(token) = &message.header.token {
            self.check_token(token)?;
        }

        if !message.is_text() {
            tracing::warn!(
                message_type = %message.message_type,
                sender = %message.sender_open_id,
                "Ignoring non-text message"
            );
            return Ok(DispatchOutcome::Ignored {
                message_type: message.message_type,
            });
        }

        let event_id = message.header.event_id.clone();
        if let Some(id) = &event_id {
            if !self.processed.claim(id).await {
                tracing::info!(event_id = %id, "Duplicate delivery, already handled");
                return Ok(DispatchOutcome::Duplicate { event_id: id.clone() });
            }
        }

        let result = self.answer(&message).await;
        if result.is_err() {
            if let Some(id) = &event_id {
                self.processed.release(id).await;
            }
        }
        result
    }

    async fn answer(&self, message: &MessageReceive) -> Result<DispatchOutcome, DispatchError> {
        let content = TextContent::parse(&message.content)?;

        let answer = self.answers.ask(content.text().to_string()).await?;
        let reply = content.with_text(answer).to_wire()?;

        self.chat.send_text(&message.sender_open_id, &reply).await?;
        tracing::info!(sender = %message.sender_open_id, reply_len = reply.len(), "Reply sent");

        Ok(DispatchOutcome::Replied {
            open_id: message.sender_open_id.clone(),
        })
    }

    fn check_token(&self, token: &str) -> Result<(), DispatchError> {
        let expected = self.verification_token.expose_secret();
        if constant_time_compare(token.as_bytes(), expected.as_bytes()) {
            Ok(())
        } else {
            Err(DispatchError::authentication("VERIFICATION_TOKEN is invalid"))
        }
    }
}

//! Spark chat frame codec.

use serde::{Deserialize, Serialize};

use crate::ports::{AnswerChunk, VendorError};

/// Status value marking the last frame of an answer.
pub const FINAL_STATUS: i64 = 2;

/// Generation parameters sent with every question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatParameters {
    pub domain: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ChatParameters {
    fn default() -> Self {
        Self {
            domain: "general".to_string(),
            temperature: 0.5,
            max_tokens: 2048,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Request frame
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
pub struct RequestFrame<'a> {
    header: RequestHeader<'a>,
    parameter: RequestParameter<'a>,
    payload: RequestPayload<'a>,
}

#[derive(Debug, Serialize)]
struct RequestHeader<'a> {
    app_id: &'a str,
    uid: &'a str,
}

#[derive(Debug, Serialize)]
struct RequestParameter<'a> {
    chat: &'a ChatParameters,
}

#[derive(Debug, Serialize)]
struct RequestPayload<'a> {
    message: RequestMessage<'a>,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    text: [ChatText<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ChatText<'a> {
    role: &'a str,
    content: &'a str,
}

impl<'a> RequestFrame<'a> {
    /// A single-turn user question.
    pub fn question(
        app_id: &'a str,
        uid: &'a str,
        chat: &'a ChatParameters,
        question: &'a str,
    ) -> Self {
        Self {
            header: RequestHeader { app_id, uid },
            parameter: RequestParameter { chat },
            payload: RequestPayload {
                message: RequestMessage {
                    text: [ChatText {
                        role: "user",
                        content: question,
                    }],
                },
            },
        }
    }

    pub fn to_json(&self) -> Result<String, VendorError> {
        serde_json::to_string(self).map_err(|e| VendorError::Protocol(format!("cannot encode request: {e}")))
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Response frame
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct ResponseFrame {
    header: ResponseHeader,
    #[serde(default)]
    payload: Option<ResponsePayload>,
}

#[derive(Debug, Deserialize)]
struct ResponseHeader {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: i64,
}

#[derive(Debug, Deserialize)]
struct ResponsePayload {
    choices: Choices,
}

#[derive(Debug, Deserialize)]
struct Choices {
    status: i64,
    #[serde(default)]
    text: Vec<ChoiceText>,
}

#[derive(Debug, Deserialize)]
struct ChoiceText {
    #[serde(default)]
    content: String,
}

/// Decodes one text frame from the vendor.
///
/// A non-zero `header.code` is returned as `VendorError::Rejected`.
pub fn decode_response(frame: &str) -> Result<AnswerChunk, VendorError> {
    let frame: ResponseFrame = serde_json::from_str(frame)
        .map_err(|e| VendorError::Protocol(format!("cannot decode frame: {e}")))?;

    if frame.header.code != 0 {
        return Err(VendorError::Rejected {
            code: frame.header.code,
            message: frame.header.message,
        });
    }

    match frame.payload {
        Some(payload) => {
            let content = payload
                .choices
                .text
                .into_iter()
                .map(|t| t.content)
                .collect::<String>();
            Ok(AnswerChunk {
                content,
                is_final: payload.choices.status == FINAL_STATUS,
            })
        }
        None if frame.header.status == FINAL_STATUS => Ok(AnswerChunk::last("")),
        None => Err(VendorError::Protocol("frame has no payload".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn encodes_request_frame() {
        let chat = ChatParameters::default();
        let frame = RequestFrame::question("app1", "uid-1", &chat, "what is rust?");

        let value: Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();

        assert_eq!(
            value,
            json!({
                "header": {"app_id": "app1", "uid": "uid-1"},
                "parameter": {"chat": {"domain": "general", "temperature": 0.5, "max_tokens": 2048}},
                "payload": {"message": {"text": [{"role": "user", "content": "what is rust?"}]}}
            })
        );
    }

    #[test]
    fn decodes_partial_frame() {
        let frame = r#"{"header":{"code":0,"message":"Success","sid":"cht1","status":1},
            "payload":{"choices":{"status":1,"seq":0,"text":[{"content":"Hello","role":"assistant","index":0}]}}}"#;

        assert_eq!(decode_response(frame), Ok(AnswerChunk::partial("Hello")));
    }

    #[test]
    fn decodes_final_frame() {
        let frame = r#"{"header":{"code":0,"message":"Success","status":2},
            "payload":{"choices":{"status":2,"seq":3,"text":[{"content":" world","role":"assistant"}]},
            "usage":{"text":{"total_tokens":12}}}}"#;

        assert_eq!(decode_response(frame), Ok(AnswerChunk::last(" world")));
    }

    #[test]
    fn decodes_error_frame() {
        let frame = r#"{"header":{"code":10013,"message":"input content audit failed","sid":"cht2","status":2}}"#;

        assert_eq!(
            decode_response(frame),
            Err(VendorError::Rejected {
                code: 10013,
                message: "input content audit failed".to_string()
            })
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(decode_response("not json"), Err(VendorError::Protocol(_))));
        assert!(matches!(
            decode_response(r#"{"header":{"code":0,"status":1}}"#),
            Err(VendorError::Protocol(_))
        ));
    }
}

//! Text message content as carried by Lark: a JSON object serialized into a string.

use std::io;

use serde::Serialize;
use serde_json::{Map, Value};

use super::errors::DispatchError;

/// Parsed `content` of a text message.
///
/// Keys other than `text` are kept so the reply mirrors the incoming shape.
#[derive(Debug, Clone, PartialEq)]
pub struct TextContent {
    fields: Map<String, Value>,
}

impl TextContent {
    pub fn parse(content: &str) -> Result<Self, DispatchError> {
        let fields: Map<String, Value> = serde_json::from_str(content)
            .map_err(|e| DispatchError::malformed(format!("text content is not a JSON object: {}", e)))?;

        match fields.get("text") {
            Some(Value::String(_)) => Ok(Self { fields }),
            _ => Err(DispatchError::malformed("text content has no \"text\" string")),
        }
    }

    pub fn new(text: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("text".to_string(), Value::String(text.into()));
        Self { fields }
    }

    pub fn text(&self) -> &str {
        self.fields
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Returns a copy with `text` replaced.
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        let mut fields = self.fields.clone();
        fields.insert("text".to_string(), Value::String(text.into()));
        Self { fields }
    }

    /// Serializes with `": "` and `", "` separators, e.g. `{"text": "hi there"}`.
    pub fn to_wire(&self) -> Result<String, DispatchError> {
        let mut buf = Vec::new();
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
        self.fields
            .serialize(&mut serializer)
            .map_err(|e| DispatchError::malformed(format!("cannot encode reply: {}", e)))?;
        String::from_utf8(buf).map_err(|e| DispatchError::malformed(format!("cannot encode reply: {}", e)))
    }
}

struct SpacedFormatter;

impl serde_json::ser::Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}

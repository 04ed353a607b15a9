//! Push envelope
//!
//! The messaging layer delivers each message as a JSON envelope:
//!
//! ```json
//! {
//!   "message": {
//!     "attributes": {"job": "daily-report"},
//!     "data": "eyJqb2IiOiAiZmV0Y2gtdHJlbmRzIn0=",
//!     "messageId": "1234",
//!     "publishTime": "2024-05-01T00:00:00Z"
//!   },
//!   "subscription": "projects/p/subscriptions/s"
//! }
//! ```
//!
//! Parsing is lenient. A body that is not JSON, or fields with the wrong
//! shape, degrade to empty defaults instead of failing the request.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, warn};

use crate::error::Result;
use crate::payload::{decode_payload, Payload};

/// Outer push envelope
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PushEnvelope {
    pub message: PushMessage,
    pub subscription: Option<String>,
}

/// The message carried by a push envelope
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PushMessage {
    pub attributes: BTreeMap<String, String>,
    /// Base64-encoded payload bytes, empty when absent
    pub data: String,
    pub message_id: Option<String>,
    pub publish_time: Option<String>,
}

impl PushEnvelope {
    /// Parse a request body, substituting defaults for anything missing or malformed.
    pub fn from_body(body: &[u8]) -> Self {
        let value = match serde_json::from_slice::<JsonValue>(body) {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, body_len = body.len(), "Push body is not JSON, using empty envelope");
                return Self::default();
            },
        };

        let Some(root) = value.as_object() else {
            return Self::default();
        };

        let message = root
            .get("message")
            .and_then(JsonValue::as_object)
            .map(PushMessage::from_json)
            .unwrap_or_default();

        Self {
            message,
            subscription: string_field(root, "subscription"),
        }
    }
}

impl PushMessage {
    fn from_json(obj: &Map<String, JsonValue>) -> Self {
        let attributes = obj
            .get("attributes")
            .and_then(JsonValue::as_object)
            .map(|attrs| {
                attrs
                    .iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| {
                        let text = match v {
                            JsonValue::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        (k.clone(), text)
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            attributes,
            data: string_field(obj, "data").unwrap_or_default(),
            message_id: string_field(obj, "messageId").or_else(|| string_field(obj, "message_id")),
            publish_time: string_field(obj, "publishTime")
                .or_else(|| string_field(obj, "publish_time")),
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Undo the transport encoding: base64, then UTF-8.
    ///
    /// ASCII whitespace inside the encoded text (line-wrapped producers) is ignored.
    pub fn decode_data(&self) -> Result<String> {
        let compact: String = self.data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes = STANDARD.decode(compact.as_bytes())?;
        Ok(String::from_utf8(bytes)?)
    }

    /// Decoded payload of this message.
    ///
    /// Empty data gives an empty payload. A failure in the transport decode is
    /// recovered here as `{"raw_data_b64": <data>}`; the payload decoder itself
    /// never fails.
    pub fn payload(&self) -> Payload {
        if self.data.is_empty() {
            return Payload::new();
        }

        match self.decode_data() {
            Ok(text) => decode_payload(&text),
            Err(e) => {
                warn!(error = %e, message_id = ?self.message_id, "Could not decode push message data");
                Payload::raw_data_b64(self.data.clone())
            },
        }
    }
}

fn string_field(obj: &Map<String, JsonValue>, key: &str) -> Option<String> {
    obj.get(key).and_then(JsonValue::as_str).map(str::to_string)
}

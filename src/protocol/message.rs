//! Inbound and outbound message types

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message received from a peer
///
/// Kinds this server does not understand decode to [`InboundMessage::Unknown`]
/// so newer clients keep working against an older server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InboundMessage {
    /// Application-level ping, answered with a pong to the sender only
    Ping,
    /// Payload to relay to every other peer
    #[serde(rename = "message")]
    Relay {
        #[serde(default)]
        data: Option<Value>,
    },
    /// Any other `type` value
    #[serde(other)]
    Unknown,
}

impl InboundMessage {
    /// Decode a raw frame
    ///
    /// Fails if the bytes are not a JSON object or carry no string `type`.
    pub fn decode(raw: &[u8]) -> Result<Self, DecodeError> {
        let value: Value =
            serde_json::from_slice(raw).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;

        match value.get("type") {
            Some(Value::String(_)) => {}
            _ => return Err(DecodeError::MissingType),
        }

        serde_json::from_value(value).map_err(|e| DecodeError::InvalidJson(e.to_string()))
    }
}

/// Message sent to one or more peers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundMessage {
    /// Current number of connected peers
    ViewerCount { count: usize },
    /// Sent once to a peer right after it joins
    Connection { status: String },
    /// Reply to an application-level ping
    Pong,
    /// Relayed payload from another peer
    #[serde(rename = "message")]
    Relay {
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
}

impl OutboundMessage {
    /// Connection confirmation for a newly joined peer
    pub fn connected() -> Self {
        OutboundMessage::Connection {
            status: super::constants::CONNECTION_STATUS_CONNECTED.to_string(),
        }
    }

    /// Encode to a JSON text frame
    pub fn encode(&self) -> Result<Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(Bytes::from)
    }
}

/// Failure to decode an inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Not valid JSON, or JSON of the wrong shape
    InvalidJson(String),
    /// JSON object without a string `type` field
    MissingType,
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::InvalidJson(reason) => write!(f, "Invalid JSON: {}", reason),
            DecodeError::MissingType => write!(f, "Missing message type"),
        }
    }
}

impl std::error::Error for DecodeError {}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn encoded(msg: OutboundMessage) -> Value {
        serde_json::from_slice(&msg.encode().unwrap()).unwrap()
    }

    #[test]
    fn test_decode_ping() {
        assert_eq!(
            InboundMessage::decode(br#"{"type":"ping"}"#),
            Ok(InboundMessage::Ping)
        );
    }

    #[test]
    fn test_decode_relay_keeps_payload() {
        let msg = InboundMessage::decode(br#"{"type":"message","data":{"text":"hi","n":[1,2]}}"#);
        assert_eq!(
            msg,
            Ok(InboundMessage::Relay {
                data: Some(json!({"text": "hi", "n": [1, 2]}))
            })
        );
    }

    #[test]
    fn test_decode_relay_without_data() {
        let msg = InboundMessage::decode(br#"{"type":"message"}"#).unwrap();
        assert_eq!(msg, InboundMessage::Relay { data: None });
    }

    #[test]
    fn test_decode_unknown_kind() {
        let msg = InboundMessage::decode(br#"{"type":"typing","who":"a"}"#);
        assert_eq!(msg, Ok(InboundMessage::Unknown));
    }

    #[test]
    fn test_decode_not_json() {
        assert!(matches!(
            InboundMessage::decode(b"\x00\x01hello"),
            Err(DecodeError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_decode_missing_type() {
        assert_eq!(
            InboundMessage::decode(br#"{"data":"hi"}"#),
            Err(DecodeError::MissingType)
        );
        // Non-string discriminators are treated as missing
        assert_eq!(
            InboundMessage::decode(br#"{"type":5}"#),
            Err(DecodeError::MissingType)
        );
        // So are non-object payloads
        assert_eq!(
            InboundMessage::decode(br#"["ping"]"#),
            Err(DecodeError::MissingType)
        );
    }

    #[test]
    fn test_encode_viewer_count() {
        assert_eq!(
            encoded(OutboundMessage::ViewerCount { count: 2 }),
            json!({"type": "viewerCount", "count": 2})
        );
    }

    #[test]
    fn test_encode_connected() {
        assert_eq!(
            encoded(OutboundMessage::connected()),
            json!({"type": "connection", "status": "connected"})
        );
    }

    #[test]
    fn test_encode_pong() {
        assert_eq!(encoded(OutboundMessage::Pong), json!({"type": "pong"}));
    }

    #[test]
    fn test_encode_relay() {
        assert_eq!(
            encoded(OutboundMessage::Relay {
                data: Some(json!("hi"))
            }),
            json!({"type": "message", "data": "hi"})
        );
        // Missing data is omitted rather than sent as null
        assert_eq!(
            encoded(OutboundMessage::Relay { data: None }),
            json!({"type": "message"})
        );
    }

    #[test]
    fn test_encode_never_yields_empty_frame() {
        let messages = [
            OutboundMessage::ViewerCount { count: 0 },
            OutboundMessage::connected(),
            OutboundMessage::Pong,
            OutboundMessage::Relay { data: None },
            OutboundMessage::Relay {
                data: Some(json!({"nested": [null, 1.5, {"k": "v"}]})),
            },
        ];

        for msg in messages {
            let frame = msg.encode().unwrap();
            assert!(!frame.is_empty());
            assert!(serde_json::from_slice::<Value>(&frame).unwrap()["type"].is_string());
        }
    }
}

//! JSON-RPC message envelope and codec — SPEC_FULL.md §3, §4.B.
//!
//! Pure functions only: [`encode`] and [`decode`] never panic on malformed
//! input, they return a [`CodecError`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CodecError;

/// Structured RPC parameters. Unlike the JS source, a bare "any value" params
/// argument is unrepresentable — see SPEC_FULL.md §9.
#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    None,
    Array(Vec<Value>),
    Object(Map<String, Value>),
}

impl Params {
    pub fn is_none(&self) -> bool {
        matches!(self, Params::None)
    }

    /// The single argument a handler sees when `params` is absent or an
    /// object, or the positional array when `params` is array-valued.
    pub fn into_value(self) -> Value {
        match self {
            Params::None => Value::Null,
            Params::Array(v) => Value::Array(v),
            Params::Object(m) => Value::Object(m),
        }
    }

    fn into_wire(self) -> Option<Value> {
        match self {
            Params::None => None,
            Params::Array(v) => Some(Value::Array(v)),
            Params::Object(m) => Some(Value::Object(m)),
        }
    }

    fn from_wire(value: Option<Value>) -> Result<Self, CodecError> {
        match value {
            None | Some(Value::Null) => Ok(Params::None),
            Some(Value::Array(a)) => Ok(Params::Array(a)),
            Some(Value::Object(o)) => Ok(Params::Object(o)),
            Some(_) => Err(CodecError::InvalidParams),
        }
    }
}

impl From<Vec<Value>> for Params {
    fn from(v: Vec<Value>) -> Self {
        Params::Array(v)
    }
}

/// The `{message, code?, data?, stack?}` error object on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// A decoded, classified message — one of the three envelope shapes in §3.
#[derive(Debug, Clone)]
pub enum Message {
    Request {
        id: u64,
        method: String,
        params: Params,
    },
    Response {
        id: u64,
        outcome: Outcome,
    },
    Notification {
        method: String,
        params: Params,
    },
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Result(Value),
    Error(WireError),
}

impl Message {
    pub fn request(id: u64, method: impl Into<String>, params: Params) -> Self {
        Message::Request {
            id,
            method: method.into(),
            params,
        }
    }

    pub fn notification(method: impl Into<String>, params: Params) -> Self {
        Message::Notification {
            method: method.into(),
            params,
        }
    }

    pub fn result(id: u64, value: Value) -> Self {
        Message::Response {
            id,
            outcome: Outcome::Result(value),
        }
    }

    pub fn error(id: u64, error: WireError) -> Self {
        Message::Response {
            id,
            outcome: Outcome::Error(error),
        }
    }
}

/// The literal on-the-wire JSON shape. `jsonrpc` is tolerated-but-not-required
/// on decode and always emitted on encode (§6).
#[derive(Debug, Serialize, Deserialize, Default)]
struct WireMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    jsonrpc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<WireError>,
}

/// Serialize a [`Message`] to its wire JSON string. Infallible: every
/// `Message` we can construct has a valid wire rendering.
pub fn encode(message: &Message) -> String {
    let wire = match message {
        Message::Request { id, method, params } => WireMessage {
            jsonrpc: Some("2.0".to_string()),
            id: Some(*id),
            method: Some(method.clone()),
            params: params.clone().into_wire(),
            ..Default::default()
        },
        Message::Notification { method, params } => WireMessage {
            jsonrpc: Some("2.0".to_string()),
            method: Some(method.clone()),
            params: params.clone().into_wire(),
            ..Default::default()
        },
        Message::Response {
            id,
            outcome: Outcome::Result(value),
        } => WireMessage {
            jsonrpc: Some("2.0".to_string()),
            id: Some(*id),
            result: Some(value.clone()),
            ..Default::default()
        },
        Message::Response {
            id,
            outcome: Outcome::Error(error),
        } => WireMessage {
            jsonrpc: Some("2.0".to_string()),
            id: Some(*id),
            error: Some(error.clone()),
            ..Default::default()
        },
    };
    // A WireMessage built from a real Message always serializes — the
    // unwrap documents that invariant rather than hiding a real failure mode.
    serde_json::to_string(&wire).expect("wire message is always serializable")
}

/// Parse and classify a wire string. Never panics — malformed input is a
/// `CodecError`, reported by the peer as a protocol `"error"` event.
pub fn decode(raw: &str) -> Result<Message, CodecError> {
    let value: Value = serde_json::from_str(raw)?;
    if value.is_null() {
        return Err(CodecError::NullMessage);
    }
    if !value.is_object() {
        return Err(CodecError::NotAnObject);
    }
    let wire: WireMessage = serde_json::from_value(value)?;

    match (wire.id, wire.method) {
        (Some(id), Some(method)) => Ok(Message::Request {
            id,
            method,
            params: Params::from_wire(wire.params)?,
        }),
        (Some(id), None) => {
            if let Some(result) = wire.result {
                Ok(Message::Response {
                    id,
                    outcome: Outcome::Result(result),
                })
            } else if let Some(error) = wire.error {
                Ok(Message::Response {
                    id,
                    outcome: Outcome::Error(error),
                })
            } else {
                Err(CodecError::Unclassifiable)
            }
        }
        (None, Some(method)) => Ok(Message::Notification {
            method,
            params: Params::from_wire(wire.params)?,
        }),
        (None, None) => Err(CodecError::Unclassifiable),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_request() {
        let msg = Message::request(1, "Echo", Params::Array(vec![Value::from(42)]));
        let wire = encode(&msg);
        assert!(wire.contains("\"method\":\"Echo\""));
        match decode(&wire).unwrap() {
            Message::Request { id, method, params } => {
                assert_eq!(id, 1);
                assert_eq!(method, "Echo");
                assert_eq!(params, Params::Array(vec![Value::from(42)]));
            }
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn decodes_response_missing_jsonrpc_tag() {
        let raw = r#"{"id":7,"result":"ok"}"#;
        match decode(raw).unwrap() {
            Message::Response {
                id,
                outcome: Outcome::Result(v),
            } => {
                assert_eq!(id, 7);
                assert_eq!(v, Value::from("ok"));
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_json() {
        let err = decode("{").unwrap_err();
        assert!(matches!(err, CodecError::Json(_)));
    }

    #[test]
    fn rejects_non_object_top_level() {
        let err = decode("[1,2,3]").unwrap_err();
        assert!(matches!(err, CodecError::NotAnObject));
    }

    #[test]
    fn rejects_response_missing_result_and_error() {
        let err = decode(r#"{"id":1}"#).unwrap_err();
        assert!(matches!(err, CodecError::Unclassifiable));
    }

    #[test]
    fn rejects_non_structured_params() {
        let err = Params::from_wire(Some(Value::from("nope"))).unwrap_err();
        assert!(matches!(err, CodecError::InvalidParams));
    }

    #[test]
    fn notification_has_no_id() {
        let msg = Message::notification("Foo.changed", Params::Array(vec![]));
        let wire = encode(&msg);
        assert!(!wire.contains("\"id\""));
    }
}

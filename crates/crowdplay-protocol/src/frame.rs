//! Envelope decoding.

use serde_json::Value;

use crate::error::CodecError;

/// One decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Server-originated call or push: `{"type":"method", ...}`.
    Method {
        /// Request id when the server expects a reply. Pushes usually carry none.
        id: Option<u64>,
        /// Method name, e.g. `giveInput`.
        method: String,
        /// Raw params, `Null` when absent.
        params: Value,
    },
    /// Answer to one of our requests: `{"type":"reply", ...}`.
    Reply {
        /// Id of the request being answered.
        id: u64,
        /// Raw result, `Null` when absent.
        result: Value,
        /// Error object, if the server rejected the request.
        error: Option<Value>,
    },
    /// Any other frame type. The protocol is forward-extensible, so these are skipped.
    Other {
        /// The `type` value that was not recognized.
        kind: String,
    },
}

/// Decode one text frame.
pub fn decode_frame(text: &str) -> Result<Frame, CodecError> {
    let value: Value = serde_json::from_str(text).map_err(CodecError::Malformed)?;
    let Value::Object(mut object) = value else {
        return Err(CodecError::NotAnObject);
    };

    let kind = object
        .get("type")
        .and_then(Value::as_str)
        .ok_or(CodecError::MissingField("type"))?
        .to_string();

    match kind.as_str() {
        "method" => {
            let method = object
                .get("method")
                .and_then(Value::as_str)
                .ok_or(CodecError::MissingField("method"))?
                .to_string();
            Ok(Frame::Method {
                id: object.get("id").and_then(parse_id),
                method,
                params: object.remove("params").unwrap_or(Value::Null),
            })
        }
        "reply" => {
            let id = object
                .get("id")
                .and_then(parse_id)
                .ok_or(CodecError::MissingField("id"))?;
            let error = object.remove("error").filter(|e| !e.is_null());
            Ok(Frame::Reply {
                id,
                result: object.remove("result").unwrap_or(Value::Null),
                error,
            })
        }
        _ => Ok(Frame::Other { kind }),
    }
}

/// Ids arrive as numbers, but numeric strings have been seen in the wild.
fn parse_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

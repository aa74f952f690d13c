//! msgpack-RPC message model.
//!
//! Neovim speaks msgpack-RPC: every frame is a msgpack array whose first
//! element is the message type.
//!
//! | type | layout                          |
//! |------|---------------------------------|
//! | 0    | `[0, msgid, method, params]`    |
//! | 1    | `[1, msgid, error, result]`     |
//! | 2    | `[2, method, params]`           |

use nvimfs_core::{Error, Result};
use rmpv::Value;

const REQUEST: u64 = 0;
const RESPONSE: u64 = 1;
const NOTIFICATION: u64 = 2;

/// One msgpack-RPC message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Call expecting a response with the same `msgid`
    Request {
        /// Request id
        msgid: u32,
        /// Method name
        method: String,
        /// Positional arguments
        params: Vec<Value>,
    },
    /// Answer to a request; `error` is nil on success
    Response {
        /// Id of the answered request
        msgid: u32,
        /// Error payload, nil on success
        error: Value,
        /// Return value, nil on failure
        result: Value,
    },
    /// Fire-and-forget event
    Notification {
        /// Event name
        method: String,
        /// Event arguments
        params: Vec<Value>,
    },
}

impl Message {
    /// Converts the message into its wire array.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Request {
                msgid,
                method,
                params,
            } => Value::Array(vec![
                Value::from(REQUEST),
                Value::from(msgid),
                Value::from(method),
                Value::Array(params),
            ]),
            Self::Response {
                msgid,
                error,
                result,
            } => Value::Array(vec![Value::from(RESPONSE), Value::from(msgid), error, result]),
            Self::Notification { method, params } => Value::Array(vec![
                Value::from(NOTIFICATION),
                Value::from(method),
                Value::Array(params),
            ]),
        }
    }

    /// Parses a wire array.
    ///
    /// # Errors
    ///
    /// Returns `Error::Protocol` if the value is not a well-formed message.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Array(fields) = value else {
            return Err(protocol("message is not an array"));
        };
        let mut fields = fields.into_iter();
        let kind = fields.next().and_then(|v| v.as_u64());

        match (kind, fields.len()) {
            (Some(REQUEST), 3) => {
                let msgid = msgid(fields.next())?;
                let method = method(fields.next())?;
                let params = params(fields.next())?;
                Ok(Self::Request {
                    msgid,
                    method,
                    params,
                })
            }
            (Some(RESPONSE), 3) => {
                let msgid = msgid(fields.next())?;
                let error = fields.next().unwrap_or(Value::Nil);
                let result = fields.next().unwrap_or(Value::Nil);
                Ok(Self::Response {
                    msgid,
                    error,
                    result,
                })
            }
            (Some(NOTIFICATION), 2) => {
                let method = method(fields.next())?;
                let params = params(fields.next())?;
                Ok(Self::Notification { method, params })
            }
            _ => Err(protocol("unknown message layout")),
        }
    }
}

/// Extracts a human readable message from a response's error payload.
///
/// Neovim sends `[type, message]`; anything else is rendered as-is.
#[must_use]
pub fn error_text(error: &Value) -> String {
    match error {
        Value::Array(parts) => parts
            .get(1)
            .and_then(Value::as_str)
            .map_or_else(|| error.to_string(), str::to_string),
        Value::String(s) => s.as_str().map_or_else(|| error.to_string(), str::to_string),
        other => other.to_string(),
    }
}

fn protocol(message: &str) -> Error {
    Error::Protocol {
        message: message.to_string(),
    }
}

fn msgid(value: Option<Value>) -> Result<u32> {
    value
        .and_then(|v| v.as_u64())
        .and_then(|id| u32::try_from(id).ok())
        .ok_or_else(|| protocol("invalid msgid"))
}

fn method(value: Option<Value>) -> Result<String> {
    value
        .and_then(|v| v.as_str().map(str::to_string))
        .ok_or_else(|| protocol("invalid method name"))
}

fn params(value: Option<Value>) -> Result<Vec<Value>> {
    match value {
        Some(Value::Array(params)) => Ok(params),
        _ => Err(protocol("params are not an array")),
    }
}

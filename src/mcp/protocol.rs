use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

pub(crate) const JSONRPC_VERSION: &str = "2.0";

/// Invalid JSON, or a top-level value that is not a request object
pub(crate) const PARSE_ERROR: i32 = -32700;
pub(crate) const METHOD_NOT_FOUND: i32 = -32601;
/// Unknown tool, tool failure or tool timeout
pub(crate) const APPLICATION_ERROR: i32 = -32000;

/// JSON-RPC 2.0 Request
///
/// Only `method` is validated. The `jsonrpc` member and any unrecognized
/// members are ignored, whatever their type.
#[derive(Debug)]
pub(crate) struct JsonRpcRequest {
    pub id: Option<Value>,
    pub method: String,
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Build a request from an already decoded JSON value
    pub fn from_value(value: Value) -> Result<Self, ParseError> {
        let Value::Object(mut members) = value else {
            return Err(ParseError::NotAnObject);
        };
        let method = match members.remove("method") {
            Some(Value::String(method)) => method,
            _ => return Err(ParseError::MissingMethod),
        };

        Ok(Self {
            id: members.remove("id"),
            method,
            params: members.remove("params"),
        })
    }

    /// Request id to echo back; absent and `null` both become `null`
    pub fn response_id(&self) -> Value {
        self.id.clone().unwrap_or(Value::Null)
    }

    /// Params object; absent or `null` params become an empty object
    pub fn params(&self) -> Value {
        match &self.params {
            Some(Value::Null) | None => json!({}),
            Some(params) => params.clone(),
        }
    }
}

/// JSON-RPC 2.0 Response
///
/// Exactly one of `result` or `error` is serialized, via [`Payload`].
#[derive(Debug, Serialize)]
pub(crate) struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(flatten)]
    pub payload: Payload,
}

#[derive(Debug, Serialize)]
pub(crate) enum Payload {
    #[serde(rename = "result")]
    Result(Value),
    #[serde(rename = "error")]
    Error(JsonRpcError),
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            payload: Payload::Result(result),
        }
    }

    pub fn error(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            payload: Payload::Error(error),
        }
    }

    /// Response for a line that could not be parsed; its id is unrecoverable
    pub fn parse_error() -> Self {
        Self::error(
            Value::Null,
            JsonRpcError {
                code: PARSE_ERROR,
                message: "Parse error".to_string(),
                data: None,
            },
        )
    }
}

/// JSON-RPC 2.0 Error
#[derive(Debug, Serialize)]
pub(crate) struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: METHOD_NOT_FOUND,
            message: format!("Method not found: {}", method),
            data: None,
        }
    }

    pub fn application(message: impl Into<String>) -> Self {
        Self {
            code: APPLICATION_ERROR,
            message: message.into(),
            data: None,
        }
    }
}

/// Why a line could not become a request
#[derive(Debug, Error)]
pub(crate) enum ParseError {
    #[error("line is not valid UTF-8")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("request is not a JSON object")]
    NotAnObject,

    #[error("request has no string `method`")]
    MissingMethod,
}

/// Decode one raw input line and strip surrounding whitespace
///
/// An empty result means the line was blank.
pub(crate) fn decode_line(bytes: &[u8]) -> Result<&str, ParseError> {
    Ok(std::str::from_utf8(bytes)?.trim())
}

/// Parse one decoded line into a request
///
/// The text must hold a JSON object with a string `method`; anything else is
/// a [`ParseError`]. Duplicate members keep the last value.
pub(crate) fn parse_line(text: &str) -> Result<JsonRpcRequest, ParseError> {
    let value: Value = serde_json::from_str(text)?;
    JsonRpcRequest::from_value(value)
}

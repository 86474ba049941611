//! JSON-RPC 2.0 envelope model.
//!
//! Envelopes are built once, encoded, sent, and dropped. Nothing mutates
//! them after construction, so every field is plain data.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};

/// Protocol tag carried by every encoded envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// Named call arguments. Absent or `null` params decode to an empty map.
pub type Params = Map<String, Value>;

/// Correlation id. JSON `null` and an absent member both mean "no id".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    Number(i64),
    String(String),
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::Number(n) => write!(f, "{n}"),
            Id::String(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<i64> for Id {
    fn from(n: i64) -> Self {
        Id::Number(n)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::String(s.to_string())
    }
}

/// Reserved error codes (must match exactly for interop).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Malformed input unit.
    ParseError,
    /// Not an object, or `method` not a string.
    InvalidRequest,
    /// No handler registered for the method.
    MethodNotFound,
    /// Handler-level validation failure.
    InvalidParams,
    /// Application-defined conflict (e.g. subscription already active).
    Application,
}

impl ErrorCode {
    pub fn code(self) -> i32 {
        match self {
            ErrorCode::ParseError => -32700,
            ErrorCode::InvalidRequest => -32600,
            ErrorCode::MethodNotFound => -32601,
            ErrorCode::InvalidParams => -32602,
            ErrorCode::Application => -32000,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -32700 => Some(ErrorCode::ParseError),
            -32600 => Some(ErrorCode::InvalidRequest),
            -32601 => Some(ErrorCode::MethodNotFound),
            -32602 => Some(ErrorCode::InvalidParams),
            -32000 => Some(ErrorCode::Application),
            _ => None,
        }
    }

    /// Canonical human-readable message.
    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::ParseError => "Parse error",
            ErrorCode::InvalidRequest => "Invalid Request",
            ErrorCode::MethodNotFound => "Method not found",
            ErrorCode::InvalidParams => "Invalid params",
            ErrorCode::Application => "Application error",
        }
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i32,
    pub message: String,
    /// `Some(Value::Null)` when the peer sent `"data": null`.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<Value>,
}

/// A present field is `Some`, even when it is `null`.
fn present<'de, D>(de: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(de).map(Some)
}

impl ErrorObject {
    pub fn new(code: ErrorCode, data: Option<Value>) -> Self {
        Self {
            code: code.code(),
            message: code.message().to_string(),
            data,
        }
    }

    /// `-32700`; `data.detail` carries the raw parser diagnostic.
    pub fn parse_error(detail: impl Into<String>) -> Self {
        Self::new(ErrorCode::ParseError, Some(json!({ "detail": detail.into() })))
    }

    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, Some(Value::String(reason.into())))
    }

    /// `-32601`; `data.method` echoes the requested method.
    pub fn method_not_found(method: &str) -> Self {
        Self::new(ErrorCode::MethodNotFound, Some(json!({ "method": method })))
    }

    pub fn invalid_params(detail: impl Into<Value>) -> Self {
        Self::new(ErrorCode::InvalidParams, Some(detail.into()))
    }

    /// `-32000` with a caller-chosen message.
    pub fn application(message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            code: ErrorCode::Application.code(),
            message: message.into(),
            data,
        }
    }

    /// Known taxonomy entry for this code, if any.
    pub fn kind(&self) -> Option<ErrorCode> {
        ErrorCode::from_code(self.code)
    }
}

impl fmt::Display for ErrorObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(data) = &self.data {
            write!(f, ": {data}")?;
        }
        Ok(())
    }
}

/// Call or notification. `id == None` marks a notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub id: Option<Id>,
    pub method: String,
    pub params: Params,
}

impl Request {
    pub fn call(id: Id, method: impl Into<String>, params: Params) -> Self {
        Self {
            id: Some(id),
            method: method.into(),
            params,
        }
    }

    pub fn notification(method: impl Into<String>, params: Params) -> Self {
        Self {
            id: None,
            method: method.into(),
            params,
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// Reply to a call. The `Result` makes "exactly one of result/error" structural.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub id: Option<Id>,
    pub outcome: Result<Value, ErrorObject>,
}

impl Response {
    pub fn success(id: Option<Id>, result: Value) -> Self {
        Self {
            id,
            outcome: Ok(result),
        }
    }

    pub fn failure(id: Option<Id>, error: ErrorObject) -> Self {
        Self {
            id,
            outcome: Err(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// One JSON-RPC unit.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Request(Request),
    Response(Response),
}

impl Envelope {
    pub fn id(&self) -> Option<&Id> {
        match self {
            Envelope::Request(r) => r.id.as_ref(),
            Envelope::Response(r) => r.id.as_ref(),
        }
    }
}

impl From<Request> for Envelope {
    fn from(r: Request) -> Self {
        Envelope::Request(r)
    }
}

impl From<Response> for Envelope {
    fn from(r: Response) -> Self {
        Envelope::Response(r)
    }
}

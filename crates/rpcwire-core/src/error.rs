//! Shared error type across rpcwire crates.

use thiserror::Error;

/// Stable error kinds (used in logs and by callers that branch on failures).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid input / malformed configuration.
    BadRequest,
    /// Unsupported config or protocol version.
    UnsupportedVersion,
    /// Envelope could not be serialized.
    Encode,
    /// Underlying I/O failed.
    Io,
    /// Listening endpoint could not be bound.
    Bind,
    /// Internal server error.
    Internal,
}

impl ErrorKind {
    /// String representation used in logs and diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "BAD_REQUEST",
            ErrorKind::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorKind::Encode => "ENCODE",
            ErrorKind::Io => "IO",
            ErrorKind::Bind => "BIND",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, RpcWireError>;

/// Unified error type used by core, server, and client.
#[derive(Debug, Error)]
pub enum RpcWireError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unsupported version")]
    UnsupportedVersion,
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("bind {addr} failed: {reason}")]
    Bind { addr: String, reason: String },
    #[error("internal: {0}")]
    Internal(String),
}

impl RpcWireError {
    /// Map an error to its stable kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RpcWireError::BadRequest(_) => ErrorKind::BadRequest,
            RpcWireError::UnsupportedVersion => ErrorKind::UnsupportedVersion,
            RpcWireError::Encode(_) => ErrorKind::Encode,
            RpcWireError::Io(_) => ErrorKind::Io,
            RpcWireError::Bind { .. } => ErrorKind::Bind,
            RpcWireError::Internal(_) => ErrorKind::Internal,
        }
    }
}

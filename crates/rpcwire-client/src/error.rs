//! Errors surfaced to callers of the client.

use rpcwire_core::{ErrorObject, Id, RpcWireError};
use thiserror::Error;

/// Why a call did not produce a result.
///
/// `Remote` is the peer's answer; everything else is local.
#[derive(Debug, Error)]
pub enum CallError {
    /// The peer answered with a JSON-RPC error object.
    #[error("{0}")]
    Remote(ErrorObject),
    /// No answer before the deadline; the id is now untracked.
    #[error("Timeout waiting for id={id}")]
    Timeout { id: Id },
    /// The connection closed before an answer arrived.
    #[error("connection closed")]
    ConnectionClosed,
    /// Carrier failure (encode, write, HTTP round trip).
    #[error("transport: {0}")]
    Transport(#[from] RpcWireError),
    /// The server process never reported readiness.
    #[error("startup failed: {0}")]
    Startup(String),
}

impl CallError {
    /// The peer's error object, when the failure came from the peer.
    pub fn remote(&self) -> Option<&ErrorObject> {
        match self {
            CallError::Remote(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CallError::Timeout { .. })
    }
}

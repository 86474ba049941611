//! Inbound traffic that does not settle a pending call.

use rpcwire_core::{Request, Response};

/// Why a response matched no pending call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UntrackedReason {
    /// The id was issued here but its call already settled (timed out,
    /// cancelled, or answered twice).
    Settled,
    /// The id was never issued by this client.
    Unknown,
}

/// Delivered on the client's event channel, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Server-initiated notification (for example `tick`).
    Notification(Request),
    /// Late or stray response.
    Untracked {
        response: Response,
        reason: UntrackedReason,
    },
    /// Response with `id = null`: the server could not read a request.
    PeerError(Response),
    /// Peer-initiated call; the client does not serve methods.
    Unsupported(Request),
    /// Inbound unit that failed to decode.
    Malformed { raw: String, detail: String },
}

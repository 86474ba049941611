//! rpcwire client library.
//!
//! Issues JSON-RPC calls over a line-delimited stream or HTTP, correlates
//! replies by id with per-call deadlines, and surfaces everything else
//! (notifications, late replies, server-level errors) as events.

pub mod client;
pub mod error;
pub mod events;
pub mod launch;
pub mod table;
pub mod transport;

pub use client::{ClientOptions, HttpClient, RpcClient, StreamClient, DEFAULT_CALL_TIMEOUT};
pub use error::CallError;
pub use events::{ClientEvent, UntrackedReason};
pub use table::{CorrelationTable, PendingHandle, EVENT_QUEUE};
pub use transport::{HttpTransport, StreamTransport, Transport};

//! Carriers for JSON-RPC units.
//!
//! Both transports feed raw units into the same `Dispatcher`; they differ
//! only in framing and in whether the server can push notifications.

pub mod codec;
pub mod http;
pub mod stream;

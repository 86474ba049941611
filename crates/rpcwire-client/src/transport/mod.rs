//! Carrier seam for the client.
//!
//! A transport only moves outbound units. Inbound units reach the
//! correlation table from whatever task reads them, so every transport gets
//! the same timeout and late-reply behavior.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::CallError;

pub mod http;
pub mod stream;

pub use http::HttpTransport;
pub use stream::StreamTransport;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Hand one encoded unit to the carrier.
    async fn send(&self, unit: Bytes) -> Result<(), CallError>;

    /// Stop sending. Pending calls are settled by the table, not here.
    async fn close(&self) -> Result<(), CallError>;
}

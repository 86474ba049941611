//! Caller-facing client over any `Transport`.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

use rpcwire_core::{encode, Params, Request};

use crate::error::CallError;
use crate::events::ClientEvent;
use crate::table::{CorrelationTable, EVENT_QUEUE};
use crate::transport::{HttpTransport, StreamTransport, Transport};

/// Timeout applied by `call` when none is given.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub default_timeout: Duration,
    /// Events beyond this many unread ones are dropped.
    pub event_queue: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_CALL_TIMEOUT,
            event_queue: EVENT_QUEUE,
        }
    }
}

pub type StreamClient = RpcClient<StreamTransport>;
pub type HttpClient = RpcClient<HttpTransport>;

pub struct RpcClient<T: Transport> {
    transport: T,
    table: Arc<CorrelationTable>,
    options: ClientOptions,
    events: Option<mpsc::Receiver<ClientEvent>>,
}

impl RpcClient<StreamTransport> {
    /// Line-delimited client over a reader/writer pair (e.g. a child's
    /// stdout/stdin).
    pub fn connect<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Self::connect_with(reader, writer, ClientOptions::default())
    }

    pub fn connect_with<R, W>(reader: R, writer: W, options: ClientOptions) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (events_tx, events_rx) = mpsc::channel(options.event_queue.max(1));
        let table = Arc::new(CorrelationTable::new(events_tx));
        let transport = StreamTransport::start(reader, writer, Arc::clone(&table));
        Self::from_parts(transport, table, events_rx, options)
    }
}

impl RpcClient<HttpTransport> {
    /// Client for a server whose `POST /rpc` lives under `base_url`.
    pub fn connect(base_url: &str) -> Self {
        Self::connect_with(base_url, ClientOptions::default())
    }

    pub fn connect_with(base_url: &str, options: ClientOptions) -> Self {
        let (events_tx, events_rx) = mpsc::channel(options.event_queue.max(1));
        let table = Arc::new(CorrelationTable::new(events_tx));
        let transport = HttpTransport::new(base_url, Arc::clone(&table));
        Self::from_parts(transport, table, events_rx, options)
    }
}

impl<T: Transport> RpcClient<T> {
    pub fn from_parts(
        transport: T,
        table: Arc<CorrelationTable>,
        events: mpsc::Receiver<ClientEvent>,
        options: ClientOptions,
    ) -> Self {
        Self {
            transport,
            table,
            options,
            events: Some(events),
        }
    }

    /// Notifications, untracked replies, and other unsolicited traffic.
    /// Can be taken once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<ClientEvent>> {
        self.events.take()
    }

    pub fn table(&self) -> &Arc<CorrelationTable> {
        &self.table
    }

    pub async fn call(&self, method: &str, params: Params) -> Result<Value, CallError> {
        self.call_with_timeout(method, params, self.options.default_timeout)
            .await
    }

    pub async fn call_with_timeout(
        &self,
        method: &str,
        params: Params,
        timeout: Duration,
    ) -> Result<Value, CallError> {
        let (req, handle) = self.table.register(method, params, timeout)?;
        let unit = encode(&req.into())?;
        tracing::debug!(id = %handle.id(), method, "call");
        self.transport.send(unit).await?;
        handle.wait().await
    }

    /// Fire-and-forget; nothing is tracked.
    pub async fn notify(&self, method: &str, params: Params) -> Result<(), CallError> {
        let unit = encode(&Request::notification(method, params).into())?;
        self.transport.send(unit).await
    }

    /// Send bytes exactly as given (one record or body).
    pub async fn send_raw(&self, unit: impl Into<Bytes>) -> Result<(), CallError> {
        self.transport.send(unit.into()).await
    }

    /// Stop sending and fail whatever is still pending.
    pub async fn close(&self) -> Result<(), CallError> {
        let closed = self.transport.close().await;
        self.table.close();
        closed
    }
}

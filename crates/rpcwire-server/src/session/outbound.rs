use std::sync::Arc;

use rpcwire_core::{Envelope, Params, Request};
use tokio::sync::{mpsc, oneshot, watch};

/// Message consumed by a connection's writer task.
#[derive(Debug)]
pub enum Outbound {
    /// Encode and write one envelope as a record.
    Envelope(Envelope),
    /// Flush everything queued before this point, then acknowledge.
    Flush(oneshot::Sender<()>),
}

/// Emits server-initiated notifications on one connection.
///
/// A disabled notifier belongs to a transport without push (HTTP); sends are
/// dropped and reported as `false`.
#[derive(Clone, Debug)]
pub struct Notifier {
    tx: Option<mpsc::Sender<Outbound>>,
}

impl Notifier {
    pub fn new(tx: mpsc::Sender<Outbound>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Queue a notification. Returns `false` when it could not be queued.
    pub async fn notify(&self, method: &str, params: Params) -> bool {
        let Some(tx) = &self.tx else {
            tracing::debug!(method, "notification dropped: transport has no push");
            return false;
        };
        let env = Envelope::Request(Request::notification(method, params));
        tx.send(Outbound::Envelope(env)).await.is_ok()
    }
}

/// Latch set by the `shutdown` method and observed by the owning transport.
#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn request(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_requested(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once shutdown has been requested.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so `wait_for` cannot observe a closed channel.
        let _ = rx.wait_for(|requested| *requested).await;
    }
}

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use super::outbound::{Notifier, Outbound, ShutdownSignal};

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// Stateful flags for one connection.
#[derive(Debug, Default)]
pub struct Session {
    subscription_active: AtomicBool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscription_active(&self) -> bool {
        self.subscription_active.load(Ordering::Acquire)
    }

    /// Claim the connection's single subscription slot.
    ///
    /// Returns `None` while another subscription holds it. The slot is
    /// released when the guard drops, including when its task is aborted.
    pub fn try_begin_subscription(self: &Arc<Self>) -> Option<SubscriptionGuard> {
        self.subscription_active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SubscriptionGuard {
                session: Arc::clone(self),
            })
    }
}

/// Holds the subscription slot; clears it on drop.
#[derive(Debug)]
pub struct SubscriptionGuard {
    session: Arc<Session>,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.session
            .subscription_active
            .store(false, Ordering::Release);
    }
}

/// Everything a handler may touch on its connection.
#[derive(Clone, Debug)]
pub struct ConnectionCtx {
    id: u64,
    session: Arc<Session>,
    notifier: Notifier,
    shutdown: ShutdownSignal,
}

impl ConnectionCtx {
    /// Context for a stream connection (push-capable).
    pub fn streaming(tx: mpsc::Sender<Outbound>) -> Self {
        Self::with_parts(Notifier::new(tx), ShutdownSignal::new())
    }

    /// Context for request/response traffic: no push, shared shutdown latch.
    pub fn request_reply(shutdown: ShutdownSignal) -> Self {
        Self::with_parts(Notifier::disabled(), shutdown)
    }

    fn with_parts(notifier: Notifier, shutdown: ShutdownSignal) -> Self {
        Self {
            id: NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed),
            session: Arc::new(Session::new()),
            notifier,
            shutdown,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn supports_push(&self) -> bool {
        self.notifier.is_enabled()
    }

    pub fn shutdown(&self) -> &ShutdownSignal {
        &self.shutdown
    }
}

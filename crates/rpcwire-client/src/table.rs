//! Correlation table: issues ids, tracks in-flight calls, and routes
//! inbound envelopes to them.
//!
//! - Ids are integers from a counter starting at 1; never reused.
//! - Each entry resolves at most once. Whatever arrives for it later is
//!   reported as `Untracked`.
//! - Each entry carries its deadline. A reply routed after it settles the
//!   caller with `Timeout` and is reported as a late reply, even if the
//!   caller has not started waiting yet.
//! - Events go to a bounded queue; when it is full they are dropped.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, warn};

use rpcwire_core::{decode, Decoded, Envelope, Id, Params, Request};

use crate::error::CallError;
use crate::events::{ClientEvent, UntrackedReason};

type Settle = oneshot::Sender<Result<Value, CallError>>;

/// Default capacity of the event queue.
pub const EVENT_QUEUE: usize = 1024;

/// Calls with no usable deadline wait this long at most.
const MAX_TIMEOUT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

struct PendingCall {
    method: String,
    created: Instant,
    deadline: Instant,
    tx: Settle,
}

pub struct CorrelationTable {
    next_id: AtomicI64,
    pending: DashMap<Id, PendingCall>,
    closed: AtomicBool,
    events: mpsc::Sender<ClientEvent>,
}

impl CorrelationTable {
    pub fn new(events: mpsc::Sender<ClientEvent>) -> Self {
        Self {
            next_id: AtomicI64::new(1),
            pending: DashMap::new(),
            closed: AtomicBool::new(false),
            events,
        }
    }

    /// Allocate an id and track a call to `method` until `timeout` elapses.
    pub fn register(
        self: &Arc<Self>,
        method: &str,
        params: Params,
        timeout: Duration,
    ) -> Result<(Request, PendingHandle), CallError> {
        if self.is_closed() {
            return Err(CallError::ConnectionClosed);
        }

        let id = Id::Number(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = oneshot::channel();
        let created = Instant::now();
        let deadline = created
            .checked_add(timeout.min(MAX_TIMEOUT))
            .unwrap_or(created + MAX_TIMEOUT);
        self.pending.insert(
            id.clone(),
            PendingCall {
                method: method.to_string(),
                created,
                deadline,
                tx,
            },
        );

        // `close` may have drained the map between the check and the insert.
        if self.is_closed() {
            self.pending.remove(&id);
            return Err(CallError::ConnectionClosed);
        }

        let handle = PendingHandle {
            id: id.clone(),
            rx,
            deadline,
            table: Arc::clone(self),
        };
        Ok((Request::call(id, method, params), handle))
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Decode one inbound unit and route it.
    pub fn route_unit(&self, unit: &[u8]) {
        match decode(unit) {
            Decoded::Valid(env) => self.route(env),
            Decoded::Parse(failure) => self.malformed(unit, failure.detail),
            Decoded::Shape(failure) => self.malformed(unit, failure.reason),
        }
    }

    /// Settle the matching call, or report the envelope as an event.
    pub fn route(&self, env: Envelope) {
        match env {
            Envelope::Response(resp) => {
                let Some(id) = resp.id.clone() else {
                    warn!(outcome = ?resp.outcome, "server-level error");
                    self.emit(ClientEvent::PeerError(resp));
                    return;
                };
                match self.pending.remove(&id) {
                    Some((_, call)) if Instant::now() >= call.deadline => {
                        warn!(
                            %id,
                            method = %call.method,
                            elapsed_ms = call.created.elapsed().as_millis() as u64,
                            "late/untracked response"
                        );
                        let _ = call.tx.send(Err(CallError::Timeout { id: id.clone() }));
                        self.emit(ClientEvent::Untracked {
                            response: resp,
                            reason: UntrackedReason::Settled,
                        });
                    }
                    Some((_, call)) => {
                        debug!(
                            %id,
                            method = %call.method,
                            ok = resp.is_success(),
                            elapsed_ms = call.created.elapsed().as_millis() as u64,
                            "call settled"
                        );
                        let outcome = resp.outcome.map_err(CallError::Remote);
                        if call.tx.send(outcome).is_err() {
                            debug!(%id, "caller stopped waiting");
                        }
                    }
                    None => {
                        let reason = self.untracked_reason(&id);
                        warn!(%id, ?reason, "late/untracked response");
                        self.emit(ClientEvent::Untracked {
                            response: resp,
                            reason,
                        });
                    }
                }
            }
            Envelope::Request(req) if req.is_notification() => {
                debug!(method = %req.method, "notification");
                self.emit(ClientEvent::Notification(req));
            }
            Envelope::Request(req) => {
                warn!(method = %req.method, id = ?req.id, "peer-initiated call ignored");
                self.emit(ClientEvent::Unsupported(req));
            }
        }
    }

    /// Settle one call with a local failure (e.g. its HTTP round trip failed).
    pub fn fail(&self, id: &Id, err: CallError) {
        if let Some((_, call)) = self.pending.remove(id) {
            debug!(%id, method = %call.method, error = %err, "call failed locally");
            let _ = call.tx.send(Err(err));
        }
    }

    /// Fail every in-flight call; later registrations fail immediately.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let ids: Vec<Id> = self.pending.iter().map(|e| e.key().clone()).collect();
        debug!(pending = ids.len(), "closing correlation table");
        for id in ids {
            if let Some((_, call)) = self.pending.remove(&id) {
                let _ = call.tx.send(Err(CallError::ConnectionClosed));
            }
        }
    }

    fn untracked_reason(&self, id: &Id) -> UntrackedReason {
        match id {
            Id::Number(n) if *n >= 1 && *n < self.next_id.load(Ordering::Relaxed) => {
                UntrackedReason::Settled
            }
            _ => UntrackedReason::Unknown,
        }
    }

    fn malformed(&self, unit: &[u8], detail: String) {
        let raw = String::from_utf8_lossy(unit).into_owned();
        warn!(%detail, "invalid unit from server");
        self.emit(ClientEvent::Malformed { raw, detail });
    }

    fn emit(&self, event: ClientEvent) {
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => warn!(?event, "event queue full; dropped"),
            Err(TrySendError::Closed(_)) => debug!("event dropped: no listener"),
        }
    }
}

/// Waiter for one call. Dropping it cancels the call.
pub struct PendingHandle {
    id: Id,
    rx: oneshot::Receiver<Result<Value, CallError>>,
    deadline: Instant,
    table: Arc<CorrelationTable>,
}

impl PendingHandle {
    pub fn id(&self) -> &Id {
        &self.id
    }

    /// Resolve with the call's result, its remote error, a timeout, or
    /// `ConnectionClosed`.
    pub async fn wait(mut self) -> Result<Value, CallError> {
        match tokio::time::timeout_at(self.deadline, &mut self.rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(CallError::ConnectionClosed),
            Err(_) => {
                debug!(id = %self.id, "call timed out");
                Err(CallError::Timeout {
                    id: self.id.clone(),
                })
            }
        }
    }
}

impl Drop for PendingHandle {
    fn drop(&mut self) {
        self.table.pending.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpcwire_core::{ErrorObject, Response};
    use serde_json::json;

    fn table() -> (Arc<CorrelationTable>, mpsc::Receiver<ClientEvent>) {
        let (tx, rx) = mpsc::channel(16);
        (Arc::new(CorrelationTable::new(tx)), rx)
    }

    #[tokio::test]
    async fn ids_start_at_one_and_increase() {
        let (table, _rx) = table();
        let (a, _ha) = table.register("ping", Params::new(), Duration::from_secs(1)).unwrap();
        let (b, _hb) = table.register("ping", Params::new(), Duration::from_secs(1)).unwrap();
        assert_eq!(a.id, Some(Id::Number(1)));
        assert_eq!(b.id, Some(Id::Number(2)));
        assert_eq!(table.pending_count(), 2);
    }

    #[tokio::test]
    async fn response_settles_matching_call() {
        let (table, _rx) = table();
        let (req, handle) = table.register("add", Params::new(), Duration::from_secs(1)).unwrap();
        table.route(Response::success(req.id, json!({"sum": 3})).into());
        assert_eq!(handle.wait().await.unwrap(), json!({"sum": 3}));
        assert_eq!(table.pending_count(), 0);
    }

    #[tokio::test]
    async fn remote_error_is_not_a_transport_failure() {
        let (table, _rx) = table();
        let (req, handle) = table.register("add", Params::new(), Duration::from_secs(1)).unwrap();
        table.route(Response::failure(req.id, ErrorObject::invalid_params("a and b must be numbers")).into());
        let err = handle.wait().await.unwrap_err();
        assert_eq!(err.remote().map(|e| e.code), Some(-32602));
    }

    #[tokio::test]
    async fn expired_call_reports_late_reply_as_settled() {
        let (table, mut rx) = table();
        let (req, handle) = table.register("add", Params::new(), Duration::from_millis(20)).unwrap();
        let err = handle.wait().await.unwrap_err();
        assert_eq!(err.to_string(), "Timeout waiting for id=1");
        assert_eq!(table.pending_count(), 0);

        table.route(Response::success(req.id, json!(1)).into());
        match rx.recv().await.unwrap() {
            ClientEvent::Untracked { reason, .. } => assert_eq!(reason, UntrackedReason::Settled),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn reply_after_deadline_times_out_before_wait() {
        let (table, mut rx) = table();
        let (req, handle) = table.register("add", Params::new(), Duration::from_millis(20)).unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        table.route(Response::success(req.id, json!({"sum": 3})).into());
        assert_eq!(table.pending_count(), 0);
        assert!(matches!(handle.wait().await, Err(CallError::Timeout { .. })));
        match rx.try_recv().unwrap() {
            ClientEvent::Untracked { reason, response } => {
                assert_eq!(reason, UntrackedReason::Settled);
                assert_eq!(response.outcome, Ok(json!({"sum": 3})));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn full_event_queue_drops_instead_of_growing() {
        let (tx, mut rx) = mpsc::channel(2);
        let table = CorrelationTable::new(tx);
        for n in 0..5 {
            table.route(Response::success(Some(Id::Number(1000 + n)), json!(n)).into());
        }
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());

        table.route(Response::success(Some(Id::Number(2000)), json!(0)).into());
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn duplicate_reply_does_not_resettle() {
        let (table, mut rx) = table();
        let (req, handle) = table.register("ping", Params::new(), Duration::from_secs(1)).unwrap();
        table.route(Response::success(req.id.clone(), json!("first")).into());
        table.route(Response::success(req.id, json!("second")).into());
        assert_eq!(handle.wait().await.unwrap(), json!("first"));
        assert!(matches!(
            rx.recv().await.unwrap(),
            ClientEvent::Untracked { reason: UntrackedReason::Settled, .. }
        ));
    }

    #[tokio::test]
    async fn unknown_ids_and_null_ids_are_events() {
        let (table, mut rx) = table();
        table.route(Response::success(Some(Id::from("stray")), json!(0)).into());
        table.route(Response::failure(None, ErrorObject::parse_error("eof")).into());
        table.route_unit(b"not json");

        assert!(matches!(
            rx.recv().await.unwrap(),
            ClientEvent::Untracked { reason: UntrackedReason::Unknown, .. }
        ));
        assert!(matches!(rx.recv().await.unwrap(), ClientEvent::PeerError(_)));
        assert!(matches!(rx.recv().await.unwrap(), ClientEvent::Malformed { .. }));
    }

    #[tokio::test]
    async fn close_fails_pending_and_future_calls() {
        let (table, _rx) = table();
        let (_req, handle) = table.register("ping", Params::new(), Duration::from_secs(5)).unwrap();
        table.close();
        assert!(matches!(handle.wait().await, Err(CallError::ConnectionClosed)));
        assert!(matches!(
            table.register("ping", Params::new(), Duration::from_secs(5)),
            Err(CallError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn dropping_the_handle_cancels() {
        let (table, _rx) = table();
        let (_req, handle) = table.register("ping", Params::new(), Duration::from_secs(5)).unwrap();
        drop(handle);
        assert_eq!(table.pending_count(), 0);
    }
}

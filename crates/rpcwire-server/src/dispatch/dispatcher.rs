use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Value};
use tracing::{debug, warn};

use rpcwire_core::{decode, Decoded, Envelope, ErrorObject, Id, Params, Response};

use crate::session::ConnectionCtx;

/// What a handler hands back: a result value or a JSON-RPC error object.
pub type MethodResult = std::result::Result<Value, ErrorObject>;

/// Completion that runs after the dispatcher has moved on.
pub struct Deferred(Pin<Box<dyn Future<Output = MethodResult> + Send + 'static>>);

impl Deferred {
    pub fn new(fut: impl Future<Output = MethodResult> + Send + 'static) -> Self {
        Self(Box::pin(fut))
    }

    pub async fn run(self) -> MethodResult {
        self.0.await
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Deferred(..)")
    }
}

/// Handler execution mode.
#[derive(Debug)]
pub enum Outcome {
    /// Answer before the next unit is processed.
    Ready(MethodResult),
    /// Answer later; the dispatcher does not wait for it.
    Deferred(Deferred),
}

impl Outcome {
    pub fn ok(value: Value) -> Self {
        Outcome::Ready(Ok(value))
    }

    pub fn err(error: ErrorObject) -> Self {
        Outcome::Ready(Err(error))
    }

    pub fn deferred(fut: impl Future<Output = MethodResult> + Send + 'static) -> Self {
        Outcome::Deferred(Deferred::new(fut))
    }
}

/// A named JSON-RPC method.
#[async_trait]
pub trait Method: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the method emits server-initiated notifications.
    fn requires_push(&self) -> bool {
        false
    }

    async fn call(&self, ctx: &ConnectionCtx, params: Params) -> Outcome;
}

/// Result of processing one inbound unit.
#[derive(Debug)]
pub enum Processed {
    /// Emit this response now.
    Reply(Response),
    /// Run `work`, then answer `id` (unless it is a notification).
    Deferred {
        id: Option<Id>,
        method: String,
        work: Deferred,
    },
    /// Nothing goes back to the peer.
    Silent,
}

impl Processed {
    /// Await a deferred completion in place (request/response transports).
    pub async fn into_reply(self) -> Option<Response> {
        match self {
            Processed::Reply(resp) => Some(resp),
            Processed::Deferred { id, work, .. } => {
                let outcome = work.run().await;
                id.map(|id| Response {
                    id: Some(id),
                    outcome,
                })
            }
            Processed::Silent => None,
        }
    }
}

/// Registry and router for JSON-RPC methods.
#[derive(Default)]
pub struct Dispatcher {
    methods: DashMap<&'static str, Arc<dyn Method>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            methods: DashMap::new(),
        }
    }

    pub fn register(&self, method: Arc<dyn Method>) {
        self.methods.insert(method.name(), method);
    }

    pub fn registered_methods(&self) -> Vec<&'static str> {
        self.methods.iter().map(|e| *e.key()).collect()
    }

    /// Decode, validate, route, and run one unit.
    ///
    /// Protocol failures always come back as a `Reply`; nothing here can end
    /// the caller's loop.
    pub async fn process(&self, conn: &ConnectionCtx, unit: &[u8]) -> Processed {
        let req = match decode(unit) {
            Decoded::Parse(failure) => {
                warn!(conn = conn.id(), detail = %failure.detail, "parse error");
                return Processed::Reply(failure.into_response());
            }
            Decoded::Shape(failure) => {
                warn!(conn = conn.id(), reason = %failure.reason, "invalid request");
                return Processed::Reply(failure.into_response());
            }
            Decoded::Valid(Envelope::Response(resp)) => {
                warn!(conn = conn.id(), "response envelope sent to server");
                return Processed::Reply(Response::failure(
                    resp.id,
                    ErrorObject::invalid_request("method must be a string"),
                ));
            }
            Decoded::Valid(Envelope::Request(req)) => req,
        };

        debug!(conn = conn.id(), method = %req.method, id = ?req.id, "dispatch");

        let handler = self
            .methods
            .get(req.method.as_str())
            .map(|e| Arc::clone(e.value()));

        let outcome = match handler {
            None => Outcome::err(ErrorObject::method_not_found(&req.method)),
            Some(h) if h.requires_push() && !conn.supports_push() => {
                Outcome::err(ErrorObject::application(
                    "Notifications unsupported",
                    Some(json!({
                        "method": &req.method,
                        "reason": "notifications unsupported on this transport",
                    })),
                ))
            }
            Some(h) => h.call(conn, req.params).await,
        };

        match outcome {
            Outcome::Ready(_) if req.id.is_none() => Processed::Silent,
            Outcome::Ready(outcome) => Processed::Reply(Response {
                id: req.id,
                outcome,
            }),
            Outcome::Deferred(work) => Processed::Deferred {
                id: req.id,
                method: req.method,
                work,
            },
        }
    }
}

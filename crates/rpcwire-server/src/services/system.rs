use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::json;

use rpcwire_core::Params;

use crate::dispatch::{Method, Outcome};
use crate::session::ConnectionCtx;

#[derive(Default)]
pub struct PingMethod;

impl PingMethod {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Method for PingMethod {
    fn name(&self) -> &'static str {
        "ping"
    }

    async fn call(&self, _ctx: &ConnectionCtx, _params: Params) -> Outcome {
        Outcome::ok(json!({ "pong": true }))
    }
}

/// Current UTC time, RFC 3339 with millisecond precision.
#[derive(Default)]
pub struct NowMethod;

impl NowMethod {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Method for NowMethod {
    fn name(&self) -> &'static str {
        "now"
    }

    async fn call(&self, _ctx: &ConnectionCtx, _params: Params) -> Outcome {
        let iso = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        Outcome::ok(json!({ "iso": iso }))
    }
}

/// Answers, then latches the connection's shutdown signal. The transport
/// delivers the answer before it tears anything down.
#[derive(Default)]
pub struct ShutdownMethod;

impl ShutdownMethod {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Method for ShutdownMethod {
    fn name(&self) -> &'static str {
        "shutdown"
    }

    async fn call(&self, ctx: &ConnectionCtx, _params: Params) -> Outcome {
        tracing::info!(conn = ctx.id(), "shutdown requested");
        ctx.shutdown().request();
        Outcome::ok(json!({ "bye": true }))
    }
}

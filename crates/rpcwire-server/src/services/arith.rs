use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use rpcwire_core::{ErrorObject, Params};

use super::{number_value, wait_from_ms};
use crate::dispatch::{Method, Outcome};
use crate::session::ConnectionCtx;

const OPERANDS_INVALID: &str = "a and b must be numbers";

fn operand(params: &Params, key: &str) -> Option<f64> {
    params
        .get(key)
        .and_then(Value::as_f64)
        .filter(|x| x.is_finite())
}

fn operands(params: &Params) -> Result<(f64, f64), ErrorObject> {
    match (operand(params, "a"), operand(params, "b")) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(ErrorObject::invalid_params(OPERANDS_INVALID)),
    }
}

/// Optional artificial latency; turns the call into a deferred one.
fn delay(params: &Params) -> Result<Option<Duration>, ErrorObject> {
    let Some(raw) = params.get("delayMs") else {
        return Ok(None);
    };
    let wait = raw.as_f64().and_then(wait_from_ms).ok_or_else(|| {
        ErrorObject::invalid_params("delayMs must be a number between 0 and 86400000")
    })?;
    Ok((!wait.is_zero()).then_some(wait))
}

/// `add(a, b, delayMs?)` -> `{ "sum": a + b }`.
#[derive(Default)]
pub struct AddMethod;

impl AddMethod {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Method for AddMethod {
    fn name(&self) -> &'static str {
        "add"
    }

    async fn call(&self, _ctx: &ConnectionCtx, params: Params) -> Outcome {
        let (a, b) = match operands(&params) {
            Ok(v) => v,
            Err(e) => return Outcome::err(e),
        };
        let result = json!({ "sum": number_value(a + b) });

        match delay(&params) {
            Err(e) => Outcome::err(e),
            Ok(None) => Outcome::ok(result),
            Ok(Some(wait)) => Outcome::deferred(async move {
                tokio::time::sleep(wait).await;
                Ok(result)
            }),
        }
    }
}

/// `mul(a, b)` -> `{ "product": a * b }`.
#[derive(Default)]
pub struct MulMethod;

impl MulMethod {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Method for MulMethod {
    fn name(&self) -> &'static str {
        "mul"
    }

    async fn call(&self, _ctx: &ConnectionCtx, params: Params) -> Outcome {
        match operands(&params) {
            Ok((a, b)) => Outcome::ok(json!({ "product": number_value(a * b) })),
            Err(e) => Outcome::err(e),
        }
    }
}

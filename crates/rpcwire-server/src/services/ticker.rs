use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use rpcwire_core::{ErrorObject, Params};

use super::{number_value, wait_from_ms};
use crate::config::SubscriptionSection;
use crate::dispatch::{Method, Outcome};
use crate::session::ConnectionCtx;

/// Shortest tick period; `interval` values below it are rounded up.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// `subscribe(tickCount, interval)`: one `tick` notification per interval,
/// then the answer to the original call.
pub struct SubscribeMethod {
    default_tick_count: u64,
    default_interval_ms: u64,
}

impl SubscribeMethod {
    pub fn new(cfg: &SubscriptionSection) -> Self {
        Self {
            default_tick_count: cfg.default_tick_count,
            default_interval_ms: cfg.default_interval_ms,
        }
    }
}

/// First present key wins (`tickCount` before the older `maxTicks`).
fn param<'a>(params: &'a Params, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| params.get(*k))
}

fn positive_integer(v: &Value) -> Option<u64> {
    let x = v.as_f64()?;
    (x.is_finite() && x > 0.0 && x.fract() == 0.0 && x <= u32::MAX as f64).then_some(x as u64)
}

/// Positive interval in milliseconds and its tick period.
fn tick_period(v: &Value) -> Option<(f64, Duration)> {
    let ms = v.as_f64().filter(|x| *x > 0.0)?;
    Some((ms, wait_from_ms(ms)?.max(MIN_PERIOD)))
}

const INTERVAL_INVALID: &str = "interval must be a positive number up to 86400000";

#[async_trait]
impl Method for SubscribeMethod {
    fn name(&self) -> &'static str {
        "subscribe"
    }

    fn requires_push(&self) -> bool {
        true
    }

    async fn call(&self, ctx: &ConnectionCtx, params: Params) -> Outcome {
        let Some(guard) = ctx.session().try_begin_subscription() else {
            return Outcome::err(ErrorObject::application(
                "Subscription already active",
                None,
            ));
        };

        let tick_count = match param(&params, &["tickCount", "maxTicks"]) {
            None => self.default_tick_count,
            Some(v) => match positive_integer(v) {
                Some(n) => n,
                None => {
                    return Outcome::err(ErrorObject::invalid_params(
                        "tickCount must be a positive integer",
                    ))
                }
            },
        };

        let default_interval = Value::from(self.default_interval_ms);
        let interval = param(&params, &["interval", "intervalMs"]).unwrap_or(&default_interval);
        let Some((interval_ms, period)) = tick_period(interval) else {
            return Outcome::err(ErrorObject::invalid_params(INTERVAL_INVALID));
        };
        let Some(first_tick) = Instant::now().checked_add(period) else {
            return Outcome::err(ErrorObject::invalid_params(INTERVAL_INVALID));
        };
        let notifier = ctx.notifier().clone();
        let conn = ctx.id();
        tracing::debug!(conn, tick_count, interval_ms, "subscription started");

        Outcome::deferred(async move {
            let _slot = guard;
            let mut ticker = interval_at(first_tick, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            for tick in 1..=tick_count {
                ticker.tick().await;
                let mut tick_params = Params::new();
                tick_params.insert("tick".into(), json!(tick));
                tick_params.insert("tickCount".into(), json!(tick_count));
                if !notifier.notify("tick", tick_params).await {
                    tracing::debug!(conn, tick, "tick not delivered");
                }
            }

            tracing::debug!(conn, tick_count, "subscription finished");
            Ok(json!({
                "subscribed": true,
                "tickCount": tick_count,
                "interval": number_value(interval_ms),
            }))
        })
    }
}

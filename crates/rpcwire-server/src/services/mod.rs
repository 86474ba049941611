//! Built-in methods registered with the dispatcher.

mod arith;
mod system;
mod ticker;

pub use arith::{AddMethod, MulMethod};
pub use system::{NowMethod, PingMethod, ShutdownMethod};
pub use ticker::SubscribeMethod;

use std::time::Duration;

use serde_json::{Number, Value};

/// Upper bound for `delayMs` and `interval`, in milliseconds (one day).
pub(crate) const MAX_WAIT_MS: f64 = 86_400_000.0;

/// `ms` as a duration, if it is finite, non-negative and at most
/// `MAX_WAIT_MS`.
pub(crate) fn wait_from_ms(ms: f64) -> Option<Duration> {
    if !(0.0..=MAX_WAIT_MS).contains(&ms) {
        return None;
    }
    Duration::try_from_secs_f64(ms / 1000.0).ok()
}

/// JSON number for `x`, written as an integer when it is integral.
///
/// Keeps `1 + 2` on the wire as `3` rather than `3.0`.
pub(crate) fn number_value(x: f64) -> Value {
    const MAX_SAFE: f64 = 9_007_199_254_740_991.0;
    if x.fract() == 0.0 && x.abs() <= MAX_SAFE {
        return Value::from(x as i64);
    }
    Number::from_f64(x).map(Value::Number).unwrap_or(Value::Null)
}

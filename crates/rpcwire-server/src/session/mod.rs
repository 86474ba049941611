//! Per-connection state shared between the read loop, handlers, and the
//! writer.
//!
//! Each connection owns one `ConnectionCtx`: its session flags, the notifier
//! that feeds its outbound queue, and its shutdown latch. Nothing in here is
//! process-wide.

mod connection;
mod outbound;

pub use connection::{ConnectionCtx, Session, SubscriptionGuard};
pub use outbound::{Notifier, Outbound, ShutdownSignal};

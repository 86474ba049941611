//! Dispatcher module exports.
//!
//! Re-exports the dispatcher, the method trait, and handler outcomes so
//! services and transports can depend on this module directly.

pub mod dispatcher;

pub use dispatcher::{Deferred, Dispatcher, Method, MethodResult, Outcome, Processed};

//! rpcwire server library entry.
//!
//! Wires config, the method dispatcher, per-connection sessions, and the
//! stream and HTTP transports together. Consumed by the binary (`main.rs`)
//! and by integration tests.

pub mod app_state;
pub mod config;
pub mod dispatch;
pub mod router;
pub mod services;
pub mod session;
pub mod transport;

pub use app_state::AppState;
pub use config::{ServerConfig, TransportKind};
pub use transport::http::{bind, HttpServer};
pub use transport::stream::{serve_stdio, serve_stream, StreamExit};

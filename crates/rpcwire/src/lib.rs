//! Top-level facade crate for rpcwire.
//!
//! Re-exports the envelope model, the server library, and the client so
//! users can depend on a single crate.

pub mod core {
    pub use rpcwire_core::*;
}

pub mod server {
    pub use rpcwire_server::*;
}

pub mod client {
    pub use rpcwire_client::*;
}

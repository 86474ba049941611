//! rpcwire core: transport-agnostic JSON-RPC 2.0 envelopes, codec, and errors.
//!
//! This crate defines the wire-level contracts shared by the server
//! dispatcher, the client correlation table, and test tooling. It carries no
//! transport or runtime dependencies so both sides of a connection can reuse
//! it unchanged.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Malformed input is a normal return value (`Decoded::Parse` /
//! `Decoded::Shape`), never a crash.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{Result, RpcWireError};
pub use protocol::{
    codec::{decode, encode, Decoded, ParseFailure, ShapeFailure},
    envelope::{Envelope, ErrorCode, ErrorObject, Id, Params, Request, Response},
};

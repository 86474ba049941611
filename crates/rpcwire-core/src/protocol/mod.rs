//! JSON-RPC 2.0 wire format.
//!
//! - `envelope`: the typed request/response model and the error-code taxonomy.
//! - `codec`: unit <-> envelope conversion with a tagged decode result.
//!
//! Framing (line records vs. HTTP bodies) belongs to the transports; a codec
//! unit is whatever one record or one body contains.

pub mod codec;
pub mod envelope;

//! Server config loader (strict parsing).

pub mod schema;

use std::fs;

use rpcwire_core::error::{Result, RpcWireError};

pub use schema::{ServerConfig, ServerSection, SubscriptionSection, TransportKind};

pub fn load_from_file(path: &str) -> Result<ServerConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| RpcWireError::Internal(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<ServerConfig> {
    let cfg: ServerConfig = serde_yaml::from_str(s)
        .map_err(|e| RpcWireError::BadRequest(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

use std::net::SocketAddr;

use serde::Deserialize;
use rpcwire_core::error::{Result, RpcWireError};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub subscription: SubscriptionSection,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            version: 1,
            server: ServerSection::default(),
            subscription: SubscriptionSection::default(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(RpcWireError::UnsupportedVersion);
        }

        self.server.validate()?;
        self.subscription.validate()?;

        Ok(())
    }
}

/// Which carrier the binary serves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Line-delimited records over stdin/stdout.
    #[default]
    Stdio,
    /// One JSON body per `POST /rpc`.
    Http,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default)]
    pub transport: TransportKind,

    #[serde(default = "default_listen")]
    pub listen: String,

    /// Largest accepted record (stream) or body (HTTP).
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,

    /// Capacity of each connection's outbound queue.
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            listen: default_listen(),
            max_frame_bytes: default_max_frame_bytes(),
            outbound_queue: default_outbound_queue(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        if self.listen.parse::<SocketAddr>().is_err() {
            return Err(RpcWireError::BadRequest(
                "server.listen must be a valid socket address".into(),
            ));
        }
        if !(64..=16 * 1024 * 1024).contains(&self.max_frame_bytes) {
            return Err(RpcWireError::BadRequest(
                "server.max_frame_bytes must be between 64 and 16777216".into(),
            ));
        }
        if !(1..=65536).contains(&self.outbound_queue) {
            return Err(RpcWireError::BadRequest(
                "server.outbound_queue must be between 1 and 65536".into(),
            ));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen
            .parse()
            .map_err(|e| RpcWireError::BadRequest(format!("server.listen: {e}")))
    }
}

fn default_listen() -> String {
    "127.0.0.1:0".into()
}
fn default_max_frame_bytes() -> usize {
    1024 * 1024
}
fn default_outbound_queue() -> usize {
    1024
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubscriptionSection {
    /// `tickCount` used when a subscribe call omits it.
    #[serde(default = "default_tick_count")]
    pub default_tick_count: u64,

    /// `interval` (ms) used when a subscribe call omits it.
    #[serde(default = "default_interval_ms")]
    pub default_interval_ms: u64,
}

impl Default for SubscriptionSection {
    fn default() -> Self {
        Self {
            default_tick_count: default_tick_count(),
            default_interval_ms: default_interval_ms(),
        }
    }
}

impl SubscriptionSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=10_000).contains(&self.default_tick_count) {
            return Err(RpcWireError::BadRequest(
                "subscription.default_tick_count must be between 1 and 10000".into(),
            ));
        }
        if !(1..=60_000).contains(&self.default_interval_ms) {
            return Err(RpcWireError::BadRequest(
                "subscription.default_interval_ms must be between 1 and 60000".into(),
            ));
        }
        Ok(())
    }
}

fn default_tick_count() -> u64 {
    3
}
fn default_interval_ms() -> u64 {
    250
}

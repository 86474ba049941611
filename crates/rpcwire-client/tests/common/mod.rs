#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::net::SocketAddr;

use serde_json::{Map, Value};
use tokio::task::JoinHandle;

use rpcwire_client::{HttpClient, StreamClient};
use rpcwire_server::{bind, serve_stream, AppState, ServerConfig, StreamExit};

pub fn params(v: Value) -> Map<String, Value> {
    match v {
        Value::Object(map) => map,
        other => panic!("params must be an object, got {other}"),
    }
}

pub fn server_config() -> ServerConfig {
    let mut cfg = ServerConfig::default();
    cfg.subscription.default_interval_ms = 10;
    cfg
}

/// Client wired to an in-process stream server.
pub fn stream_pair() -> (StreamClient, JoinHandle<rpcwire_core::Result<StreamExit>>) {
    let state = AppState::new(server_config()).expect("state");
    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let (server_rx, server_tx) = tokio::io::split(server_io);
    let (client_rx, client_tx) = tokio::io::split(client_io);
    let server = tokio::spawn(serve_stream(state, server_rx, server_tx));
    (StreamClient::connect(client_rx, client_tx), server)
}

/// Client wired to an in-process HTTP server on an ephemeral port.
pub async fn http_pair() -> (HttpClient, JoinHandle<rpcwire_core::Result<()>>) {
    let state = AppState::new(server_config()).expect("state");
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let server = bind(state, addr).await.expect("bind");
    let client = HttpClient::connect(&format!("http://{}", server.local_addr()));
    (client, server.spawn())
}

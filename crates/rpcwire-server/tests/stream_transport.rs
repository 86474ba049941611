#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{
    split, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf,
};
use tokio::task::JoinHandle;

use rpcwire_core::Result;
use rpcwire_server::{serve_stream, AppState, ServerConfig, StreamExit};

struct Peer {
    tx: WriteHalf<DuplexStream>,
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    server: JoinHandle<Result<StreamExit>>,
}

impl Peer {
    fn start(cfg: ServerConfig) -> Self {
        let state = AppState::new(cfg).expect("state");
        let (client, server) = tokio::io::duplex(64 * 1024);
        let (server_rx, server_tx) = split(server);
        let (client_rx, client_tx) = split(client);
        Self {
            tx: client_tx,
            lines: BufReader::new(client_rx).lines(),
            server: tokio::spawn(serve_stream(state, server_rx, server_tx)),
        }
    }

    async fn send_raw(&mut self, line: &str) {
        self.tx.write_all(line.as_bytes()).await.unwrap();
        self.tx.write_all(b"\n").await.unwrap();
    }

    async fn send(&mut self, v: Value) {
        self.send_raw(&v.to_string()).await;
    }

    async fn recv(&mut self) -> Value {
        let line = tokio::time::timeout(Duration::from_secs(5), self.lines.next_line())
            .await
            .expect("timed out waiting for a record")
            .unwrap()
            .expect("stream closed");
        serde_json::from_str(&line).unwrap()
    }

    async fn finish(mut self) -> (StreamExit, Vec<Value>) {
        let mut rest = Vec::new();
        while let Some(line) = tokio::time::timeout(Duration::from_secs(5), self.lines.next_line())
            .await
            .expect("timed out draining")
            .unwrap()
        {
            rest.push(serde_json::from_str(&line).unwrap());
        }
        let exit = self.server.await.unwrap().unwrap();
        (exit, rest)
    }
}

fn fast_ticks() -> ServerConfig {
    let mut cfg = ServerConfig::default();
    cfg.subscription.default_interval_ms = 20;
    cfg
}

#[tokio::test]
async fn malformed_record_does_not_end_the_loop() {
    let mut peer = Peer::start(ServerConfig::default());
    peer.send_raw("{this is not json").await;
    peer.send(json!({"jsonrpc":"2.0","id":1,"method":"ping"})).await;

    let err = peer.recv().await;
    assert_eq!(err["jsonrpc"], "2.0");
    assert!(err["id"].is_null());
    assert_eq!(err["error"]["code"], -32700);
    assert_eq!(err["error"]["message"], "Parse error");

    let pong = peer.recv().await;
    assert_eq!(pong, json!({"jsonrpc":"2.0","id":1,"result":{"pong":true}}));
}

#[tokio::test]
async fn crlf_and_blank_lines_are_tolerated() {
    let mut peer = Peer::start(ServerConfig::default());
    peer.send_raw("").await;
    peer.send_raw("{\"id\":1,\"method\":\"add\",\"params\":{\"a\":1,\"b\":2}}\r").await;
    assert_eq!(
        peer.recv().await,
        json!({"jsonrpc":"2.0","id":1,"result":{"sum":3}})
    );
}

#[tokio::test]
async fn notifications_produce_nothing() {
    let mut peer = Peer::start(ServerConfig::default());
    peer.send(json!({"jsonrpc":"2.0","method":"ping"})).await;
    peer.send(json!({"jsonrpc":"2.0","id":2,"method":"ping"})).await;
    assert_eq!(peer.recv().await["id"], 2);
}

#[tokio::test]
async fn slow_call_does_not_block_later_ones() {
    let mut peer = Peer::start(ServerConfig::default());
    peer.send(json!({"id":1,"method":"add","params":{"a":1,"b":1,"delayMs":200}})).await;
    peer.send(json!({"id":2,"method":"ping"})).await;

    let first = peer.recv().await;
    assert_eq!(first["id"], 2);
    let second = peer.recv().await;
    assert_eq!(second["id"], 1);
    assert_eq!(second["result"]["sum"], 2);
}

#[tokio::test]
async fn subscription_ticks_then_answers() {
    let mut peer = Peer::start(fast_ticks());
    peer.send(json!({"jsonrpc":"2.0","id":1,"method":"subscribe","params":{"tickCount":3}}))
        .await;

    for n in 1..=3 {
        let tick = peer.recv().await;
        assert_eq!(tick["method"], "tick");
        assert!(tick.get("id").is_none());
        assert_eq!(tick["params"], json!({"tick": n, "tickCount": 3}));
    }
    let done = peer.recv().await;
    assert_eq!(done["id"], 1);
    assert_eq!(
        done["result"],
        json!({"subscribed": true, "tickCount": 3, "interval": 20})
    );

    // The slot is free again once the subscription finished.
    peer.send(json!({"id":2,"method":"subscribe","params":{"tickCount":1}})).await;
    assert_eq!(peer.recv().await["method"], "tick");
    assert_eq!(peer.recv().await["id"], 2);
}

#[tokio::test]
async fn concurrent_subscription_is_rejected() {
    let mut peer = Peer::start(ServerConfig::default());
    peer.send(json!({"id":1,"method":"subscribe","params":{"tickCount":1,"interval":300}}))
        .await;
    peer.send(json!({"id":2,"method":"subscribe"})).await;

    let conflict = peer.recv().await;
    assert_eq!(conflict["id"], 2);
    assert_eq!(conflict["error"]["code"], -32000);
    assert_eq!(conflict["error"]["message"], "Subscription already active");

    assert_eq!(peer.recv().await["method"], "tick");
    assert_eq!(peer.recv().await["id"], 1);
}

#[tokio::test]
async fn huge_interval_is_rejected_and_the_loop_survives() {
    let mut peer = Peer::start(fast_ticks());
    peer.send(json!({"id":1,"method":"subscribe","params":{"tickCount":1,"interval":1e22}}))
        .await;
    peer.send(json!({"id":2,"method":"add","params":{"a":1,"b":1,"delayMs":1e22}}))
        .await;

    let sub = peer.recv().await;
    assert_eq!(sub["id"], 1);
    assert_eq!(sub["error"]["code"], -32602);
    let add = peer.recv().await;
    assert_eq!(add["id"], 2);
    assert_eq!(add["error"]["code"], -32602);

    peer.send(json!({"id":3,"method":"subscribe","params":{"tickCount":1}})).await;
    assert_eq!(peer.recv().await["method"], "tick");
    assert_eq!(peer.recv().await["id"], 3);
}

#[tokio::test]
async fn oversized_record_is_invalid_request() {
    let mut cfg = ServerConfig::default();
    cfg.server.max_frame_bytes = 64;
    let mut peer = Peer::start(cfg);

    let padding = "x".repeat(200);
    peer.send(json!({"id":1,"method":"ping","params":{"pad":padding}})).await;
    peer.send(json!({"id":2,"method":"ping"})).await;

    let err = peer.recv().await;
    assert!(err["id"].is_null());
    assert_eq!(err["error"]["code"], -32600);
    assert_eq!(err["error"]["data"], "frame exceeds 64 bytes");
    assert_eq!(peer.recv().await["id"], 2);
}

#[tokio::test]
async fn shutdown_reply_is_flushed_before_close() {
    let mut peer = Peer::start(ServerConfig::default());
    peer.send(json!({"id":1,"method":"ping"})).await;
    peer.send(json!({"id":2,"method":"shutdown"})).await;

    let (exit, lines) = peer.finish().await;
    assert_eq!(exit, StreamExit::Shutdown);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["result"], json!({"pong": true}));
    assert_eq!(lines[1], json!({"jsonrpc":"2.0","id":2,"result":{"bye":true}}));
}

#[tokio::test]
async fn shutdown_abandons_running_subscription() {
    let mut peer = Peer::start(ServerConfig::default());
    peer.send(json!({"id":1,"method":"subscribe","params":{"tickCount":100,"interval":1000}}))
        .await;
    peer.send(json!({"id":2,"method":"shutdown"})).await;

    let (exit, lines) = peer.finish().await;
    assert_eq!(exit, StreamExit::Shutdown);
    assert_eq!(lines, vec![json!({"jsonrpc":"2.0","id":2,"result":{"bye":true}})]);
}

#[tokio::test]
async fn end_of_input_lets_deferred_work_finish() {
    let mut peer = Peer::start(ServerConfig::default());
    peer.send(json!({"id":1,"method":"add","params":{"a":20,"b":22,"delayMs":50}})).await;
    peer.tx.shutdown().await.unwrap();

    let (exit, lines) = peer.finish().await;
    assert_eq!(exit, StreamExit::Eof);
    assert_eq!(lines, vec![json!({"jsonrpc":"2.0","id":1,"result":{"sum":42}})]);
}

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::time::Duration;

use serde_json::json;

use rpcwire_client::{ClientEvent, UntrackedReason};
use rpcwire_core::Params;

use common::{http_pair, params, stream_pair};

#[tokio::test]
async fn call_over_http() {
    let (client, _server) = http_pair().await;
    let sum = client.call("add", params(json!({"a": 4, "b": 8}))).await.unwrap();
    assert_eq!(sum, json!({"sum": 12}));
}

#[tokio::test]
async fn same_answers_on_both_transports() {
    let (stream, _s) = stream_pair();
    let (http, _h) = http_pair().await;

    for (method, p) in [
        ("ping", json!({})),
        ("add", json!({"a": 1, "b": 2})),
        ("add", json!({"a": 0.5, "b": 0.25})),
        ("mul", json!({"a": 6, "b": 7})),
        ("add", json!({"a": "nope"})),
        ("missing", json!({})),
    ] {
        let over_stream = stream.call(method, params(p.clone())).await;
        let over_http = http.call(method, params(p)).await;
        match (over_stream, over_http) {
            (Ok(a), Ok(b)) => assert_eq!(a, b, "{method}"),
            (Err(a), Err(b)) => assert_eq!(a.remote(), b.remote(), "{method}"),
            (a, b) => panic!("{method}: transports disagree: {a:?} vs {b:?}"),
        }
    }
}

#[tokio::test]
async fn add_result_bytes_match_across_transports() {
    let (stream, _s) = stream_pair();
    let (http, _h) = http_pair().await;

    let over_stream = stream.call("add", params(json!({"a": 4, "b": 8}))).await.unwrap();
    let over_http = http.call("add", params(json!({"a": 4, "b": 8}))).await.unwrap();
    let stream_bytes = serde_json::to_vec(&over_stream).unwrap();
    let http_bytes = serde_json::to_vec(&over_http).unwrap();
    assert_eq!(stream_bytes, http_bytes);
    assert_eq!(stream_bytes, br#"{"sum":12}"#);
}

#[tokio::test]
async fn subscribe_is_refused_over_http() {
    let (client, _server) = http_pair().await;
    let err = client.call("subscribe", Params::new()).await.unwrap_err();
    let remote = err.remote().expect("remote error");
    assert_eq!(remote.code, -32000);
    assert_eq!(
        remote.data.as_ref().unwrap()["reason"],
        "notifications unsupported on this transport"
    );
}

#[tokio::test]
async fn late_http_reply_is_untracked() {
    let (mut client, _server) = http_pair().await;
    let mut events = client.take_events().unwrap();

    let err = client
        .call_with_timeout(
            "add",
            params(json!({"a": 2, "b": 3, "delayMs": 200})),
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();
    assert!(err.is_timeout());

    let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .unwrap()
        .unwrap();
    match event {
        ClientEvent::Untracked { response, reason } => {
            assert_eq!(reason, UntrackedReason::Settled);
            assert_eq!(response.outcome, Ok(json!({"sum": 5})));
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn notification_over_http_is_silent() {
    let (mut client, _server) = http_pair().await;
    let mut events = client.take_events().unwrap();
    client.notify("ping", Params::new()).await.unwrap();
    client.call("ping", Params::new()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn unreachable_server_fails_the_call() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = rpcwire_client::HttpClient::connect(&format!("http://{addr}"));
    let err = client.call("ping", Params::new()).await.unwrap_err();
    assert!(matches!(err, rpcwire_client::CallError::Transport(_)), "{err:?}");
}

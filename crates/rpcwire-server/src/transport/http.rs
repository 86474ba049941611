//! HTTP transport: one JSON-RPC unit per `POST /rpc` round trip.
//!
//! There is no server push here. Deferred completions are awaited inside the
//! round trip, and methods that need notifications are refused by the
//! dispatcher.

use std::net::SocketAddr;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use rpcwire_core::{encode, ErrorCode, Result, RpcWireError};

use crate::app_state::AppState;
use crate::router::build_router;
use crate::session::ShutdownSignal;

/// `POST /rpc`.
pub async fn handle_rpc(State(app): State<AppState>, body: Bytes) -> Response {
    let processed = app.dispatcher().process(app.http_conn(), &body).await;

    let Some(resp) = processed.into_reply().await else {
        return StatusCode::NO_CONTENT.into_response();
    };

    let status = match &resp.outcome {
        Err(e) if e.kind() == Some(ErrorCode::ParseError) => StatusCode::BAD_REQUEST,
        _ => StatusCode::OK,
    };

    match encode(&resp.into()) {
        Ok(bytes) => (
            status,
            [(header::CONTENT_TYPE, "application/json")],
            bytes,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Anything other than `POST /rpc`.
pub async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" }))).into_response()
}

/// A bound, not yet serving, HTTP listener.
pub struct HttpServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    state: AppState,
}

/// Bind the listener. Port `0` picks an ephemeral port; see `local_addr`.
pub async fn bind(state: AppState, addr: SocketAddr) -> Result<HttpServer> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| RpcWireError::Bind {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;
    let local_addr = listener.local_addr()?;
    Ok(HttpServer {
        listener,
        local_addr,
        state,
    })
}

impl HttpServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Latch that stops the server; the `shutdown` method sets it too.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.state.http_conn().shutdown().clone()
    }

    /// Serve until shutdown is requested and in-flight round trips finish.
    pub async fn serve(self) -> Result<()> {
        let shutdown = self.shutdown_signal();
        let app = build_router(self.state);
        tracing::info!(addr = %self.local_addr, "http transport serving");
        axum::serve(self.listener, app)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;
        tracing::info!("http transport stopped");
        Ok(())
    }

    pub fn spawn(self) -> JoinHandle<Result<()>> {
        tokio::spawn(self.serve())
    }
}

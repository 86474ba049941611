//! Axum router wiring for the HTTP transport.

use axum::{extract::DefaultBodyLimit, routing::post, Router};

use crate::{app_state::AppState, transport};

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.cfg().server.max_frame_bytes;
    Router::new()
        .route(
            "/rpc",
            post(transport::http::handle_rpc).fallback(transport::http::not_found),
        )
        .fallback(transport::http::not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, StatusCode};
use tracing::{debug, warn};

use rpcwire_core::{decode, Decoded, RpcWireError};

use crate::error::CallError;
use crate::table::CorrelationTable;
use crate::transport::Transport;

/// One `POST <base>/rpc` per unit.
///
/// Each round trip runs in its own task and routes the body into the table,
/// so a slow reply can outlive its caller's deadline and surface as
/// untracked, the same as on a stream.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    table: Arc<CorrelationTable>,
}

impl HttpTransport {
    pub fn new(base_url: &str, table: Arc<CorrelationTable>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!("{}/rpc", base_url.trim_end_matches('/')),
            table,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, unit: Bytes) -> Result<(), CallError> {
        let client = self.client.clone();
        let url = self.url.clone();
        let table = Arc::clone(&self.table);

        tokio::spawn(async move {
            match round_trip(&client, &url, unit.clone()).await {
                Ok(Some(body)) => table.route_unit(&body),
                Ok(None) => debug!("no content"),
                Err(e) => {
                    warn!(error = %e, %url, "http round trip failed");
                    if let Decoded::Valid(env) = decode(&unit) {
                        if let Some(id) = env.id() {
                            table.fail(id, CallError::Transport(e));
                        }
                    }
                }
            }
        });
        Ok(())
    }

    async fn close(&self) -> Result<(), CallError> {
        Ok(())
    }
}

/// POST one unit; `None` for an empty (notification) answer.
async fn round_trip(
    client: &reqwest::Client,
    url: &str,
    unit: Bytes,
) -> Result<Option<Bytes>, RpcWireError> {
    let resp = client
        .post(url)
        .header(header::CONTENT_TYPE, "application/json")
        .body(unit)
        .send()
        .await
        .map_err(std::io::Error::other)?;

    let status = resp.status();
    if status == StatusCode::NO_CONTENT {
        return Ok(None);
    }
    // 400 still carries a JSON-RPC parse error envelope.
    if !status.is_success() && status != StatusCode::BAD_REQUEST {
        return Err(RpcWireError::BadRequest(format!("http status {status}")));
    }

    let body = resp.bytes().await.map_err(std::io::Error::other)?;
    Ok((!body.is_empty()).then_some(body))
}

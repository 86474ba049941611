//! Glue for running the server as a child process.

use std::fmt::Debug;
use std::future::Future;
use std::net::SocketAddr;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, Command};
use tracing::debug;

use crate::client::{HttpClient, StreamClient};
use crate::error::CallError;

/// Marker printed by the server when it cannot start.
const SERVER_ERROR_MARKER: &str = "server error:";

/// Address from a line containing `http://<addr>`.
pub fn parse_ready_line(line: &str) -> Option<SocketAddr> {
    let (_, rest) = line.split_once("http://")?;
    let token = rest.split_whitespace().next()?;
    token.trim_end_matches('/').parse().ok()
}

/// Scan diagnostic lines until the readiness line shows up.
///
/// Fails on timeout, on `exited` resolving first, on end of input, or on a
/// `server error:` line.
pub async fn wait_for_ready<R, F, T>(
    lines: &mut Lines<R>,
    exited: F,
    timeout: Duration,
) -> Result<SocketAddr, CallError>
where
    R: AsyncBufRead + Unpin,
    F: Future<Output = T>,
    T: Debug,
{
    let scan = async {
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if let Some(addr) = parse_ready_line(&line) {
                        return Ok(addr);
                    }
                    if line.contains(SERVER_ERROR_MARKER) {
                        return Err(CallError::Startup(line));
                    }
                    debug!(target: "rpcwire_client::child", "{line}");
                }
                Ok(None) => {
                    return Err(CallError::Startup(
                        "diagnostics closed before readiness".into(),
                    ))
                }
                Err(e) => return Err(CallError::Startup(format!("reading diagnostics: {e}"))),
            }
        }
    };

    tokio::select! {
        biased;
        scanned = tokio::time::timeout(timeout, scan) => scanned.unwrap_or_else(|_| {
            Err(CallError::Startup(format!("no readiness line within {timeout:?}")))
        }),
        status = exited => Err(CallError::Startup(format!("server exited before ready: {status:?}"))),
    }
}

/// Spawn `cmd` and talk to it over its stdin/stdout.
pub fn spawn_stdio(mut cmd: Command) -> Result<(StreamClient, Child), CallError> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);
    let mut child = cmd
        .spawn()
        .map_err(|e| CallError::Startup(format!("spawn failed: {e}")))?;

    let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
        return Err(CallError::Startup("child pipes unavailable".into()));
    };
    Ok((StreamClient::connect(stdout, stdin), child))
}

/// Spawn `cmd`, wait for its readiness line on stderr, then connect over HTTP.
pub async fn spawn_http(
    mut cmd: Command,
    startup_timeout: Duration,
) -> Result<(HttpClient, Child), CallError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    let mut child = cmd
        .spawn()
        .map_err(|e| CallError::Startup(format!("spawn failed: {e}")))?;

    let Some(stderr) = child.stderr.take() else {
        return Err(CallError::Startup("child stderr unavailable".into()));
    };
    let mut lines = BufReader::new(stderr).lines();

    let addr = match wait_for_ready(&mut lines, child.wait(), startup_timeout).await {
        Ok(addr) => addr,
        Err(e) => {
            let _ = child.start_kill();
            return Err(e);
        }
    };

    // Keep draining so the child never blocks on a full pipe.
    tokio::spawn(async move {
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(target: "rpcwire_client::child", "{line}");
        }
    });

    Ok((HttpClient::connect(&format!("http://{addr}")), child))
}

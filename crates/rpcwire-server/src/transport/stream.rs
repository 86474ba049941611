//! Line-delimited stream transport.
//!
//! One connection per reader/writer pair: stdin/stdout for the binary, any
//! `AsyncRead`/`AsyncWrite` in tests. The read loop never blocks on deferred
//! work; those completions run in a `JoinSet` and write through the same
//! outbound channel as immediate replies.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn, Instrument};

use rpcwire_core::{encode, ErrorObject, Response, Result, RpcWireError};

use crate::app_state::AppState;
use crate::dispatch::Processed;
use crate::session::{ConnectionCtx, Outbound};
use crate::transport::codec::{LineReader, Record};

/// Why a stream connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamExit {
    /// The peer closed its write side.
    Eof,
    /// A `shutdown` call was answered.
    Shutdown,
    /// The writer went away; nothing more can be delivered.
    WriterClosed,
}

/// Serve the process's stdin/stdout.
pub async fn serve_stdio(state: AppState) -> Result<StreamExit> {
    serve_stream(state, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Run one connection to completion.
///
/// Returns after everything queued for the peer has been written and
/// flushed.
pub async fn serve_stream<R, W>(state: AppState, reader: R, writer: W) -> Result<StreamExit>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let server = &state.cfg().server;
    let max_frame_bytes = server.max_frame_bytes;
    let (out_tx, out_rx) = mpsc::channel::<Outbound>(server.outbound_queue);
    let conn = ConnectionCtx::streaming(out_tx.clone());
    let span = tracing::info_span!("conn", id = conn.id());

    let writer_task = tokio::spawn(write_loop(writer, out_rx).instrument(span.clone()));

    async move {
        info!("stream connection open");
        let dispatcher = state.dispatcher();
        let shutdown = conn.shutdown().clone();
        let mut records = LineReader::new(reader, max_frame_bytes);
        let mut tasks: JoinSet<()> = JoinSet::new();
        let mut read_error: Option<RpcWireError> = None;

        let exit = loop {
            tokio::select! {
                biased;

                _ = shutdown.wait() => break StreamExit::Shutdown,

                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    log_join(joined);
                }

                next = records.next_record() => {
                    let processed = match next {
                        Ok(Some(Record::Unit(unit))) => dispatcher.process(&conn, &unit).await,
                        Ok(Some(Record::Oversized(len))) => {
                            warn!(len, max_frame_bytes, "frame too large");
                            Processed::Reply(Response::failure(
                                None,
                                ErrorObject::invalid_request(format!(
                                    "frame exceeds {max_frame_bytes} bytes"
                                )),
                            ))
                        }
                        Ok(None) => break StreamExit::Eof,
                        Err(e) => {
                            warn!(error = %e, "read failed");
                            read_error = Some(e.into());
                            break StreamExit::Eof;
                        }
                    };

                    match processed {
                        Processed::Reply(resp) => {
                            if out_tx.send(Outbound::Envelope(resp.into())).await.is_err() {
                                break StreamExit::WriterClosed;
                            }
                        }
                        Processed::Deferred { id, method, work } => {
                            let tx = out_tx.clone();
                            tasks.spawn(async move {
                                let outcome = work.run().await;
                                match id {
                                    Some(id) => {
                                        let resp = Response { id: Some(id), outcome };
                                        if tx.send(Outbound::Envelope(resp.into())).await.is_err() {
                                            debug!(%method, "deferred reply dropped: writer closed");
                                        }
                                    }
                                    None => debug!(%method, "deferred notification completed"),
                                }
                            }.in_current_span());
                        }
                        Processed::Silent => {}
                    }
                }
            }
        };

        match exit {
            StreamExit::Eof => debug!(pending = tasks.len(), "input closed; finishing deferred work"),
            StreamExit::Shutdown | StreamExit::WriterClosed => {
                debug!(pending = tasks.len(), "aborting deferred work");
                tasks.abort_all();
            }
        }
        while let Some(joined) = tasks.join_next().await {
            log_join(joined);
        }

        let (ack_tx, ack_rx) = oneshot::channel();
        if out_tx.send(Outbound::Flush(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
        drop(out_tx);
        drop(conn);

        match writer_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "writer failed"),
            Err(e) => error!(error = %e, "writer task failed"),
        }

        info!(?exit, "stream connection closed");
        match read_error {
            Some(e) => Err(e),
            None => Ok(exit),
        }
    }
    .instrument(span)
    .await
}

fn log_join(joined: std::result::Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            error!(error = %e, "deferred handler panicked");
        }
    }
}

/// Owns the write half: one record per envelope, flushed as it goes.
async fn write_loop<W>(writer: W, mut rx: mpsc::Receiver<Outbound>) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut w = BufWriter::new(writer);
    while let Some(msg) = rx.recv().await {
        match msg {
            Outbound::Envelope(env) => {
                let bytes = match encode(&env) {
                    Ok(b) => b,
                    Err(e) => {
                        error!(error = %e, id = ?env.id(), "dropping unencodable envelope");
                        continue;
                    }
                };
                w.write_all(&bytes).await?;
                w.write_all(b"\n").await?;
                w.flush().await?;
            }
            Outbound::Flush(ack) => {
                w.flush().await?;
                let _ = ack.send(());
            }
        }
    }
    w.flush().await?;
    w.shutdown().await
}

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::CallError;
use crate::table::CorrelationTable;
use crate::transport::Transport;

enum WriterMsg {
    Unit(Bytes),
    Close(oneshot::Sender<()>),
}

/// Line-framed writer over any `AsyncWrite`.
pub struct StreamTransport {
    tx: mpsc::Sender<WriterMsg>,
}

impl StreamTransport {
    /// Start the writer task and the reader task that feeds `table`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<R, W>(reader: R, writer: W, table: Arc<CorrelationTable>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(write_loop(writer, rx));
        tokio::spawn(read_loop(reader, table));
        Self { tx }
    }
}

#[async_trait]
impl Transport for StreamTransport {
    async fn send(&self, unit: Bytes) -> Result<(), CallError> {
        self.tx
            .send(WriterMsg::Unit(unit))
            .await
            .map_err(|_| CallError::ConnectionClosed)
    }

    async fn close(&self) -> Result<(), CallError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(WriterMsg::Close(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
        Ok(())
    }
}

async fn write_loop<W: AsyncWrite + Unpin>(writer: W, mut rx: mpsc::Receiver<WriterMsg>) {
    let mut w = BufWriter::new(writer);
    while let Some(msg) = rx.recv().await {
        match msg {
            WriterMsg::Unit(unit) => {
                let written = async {
                    w.write_all(&unit).await?;
                    w.write_all(b"\n").await?;
                    w.flush().await
                }
                .await;
                if let Err(e) = written {
                    warn!(error = %e, "write to server failed");
                    return;
                }
            }
            WriterMsg::Close(ack) => {
                if let Err(e) = w.shutdown().await {
                    debug!(error = %e, "closing server input failed");
                }
                let _ = ack.send(());
                return;
            }
        }
    }
}

/// One record per line; on end of input or a read error the table closes.
async fn read_loop<R: AsyncRead + Unpin>(reader: R, table: Arc<CorrelationTable>) {
    let mut records = BufReader::new(reader).split(b'\n');
    loop {
        match records.next_segment().await {
            Ok(Some(mut line)) => {
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                table.route_unit(&line);
            }
            Ok(None) => {
                debug!("server output closed");
                break;
            }
            Err(e) => {
                warn!(error = %e, "read from server failed");
                break;
            }
        }
    }
    table.close();
}

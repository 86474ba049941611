//! Line-record framing for byte streams.
//!
//! - One unit per `\n`-terminated line; a trailing `\r` is stripped.
//! - Blank lines are skipped.
//! - A final line without terminator is still a record.
//! - Lines longer than the frame cap are discarded while they stream in and
//!   surface as `Record::Oversized`, so memory stays bounded.

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

#[derive(Debug, PartialEq, Eq)]
pub enum Record {
    /// Raw unit bytes, terminator removed.
    Unit(Vec<u8>),
    /// Line exceeded the cap; carries the number of bytes seen.
    Oversized(usize),
}

pub struct LineReader<R> {
    inner: BufReader<R>,
    max_frame_bytes: usize,
    buf: Vec<u8>,
    /// Bytes of the current line that did not fit under the cap.
    overflow: usize,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(reader: R, max_frame_bytes: usize) -> Self {
        Self {
            inner: BufReader::new(reader),
            max_frame_bytes,
            buf: Vec::new(),
            overflow: 0,
        }
    }

    /// Next non-blank record, or `None` at end of input.
    ///
    /// Cancel safe: a partially read line stays buffered for the next call.
    pub async fn next_record(&mut self) -> io::Result<Option<Record>> {
        loop {
            let chunk = self.inner.fill_buf().await?;
            if chunk.is_empty() {
                if self.buf.is_empty() && self.overflow == 0 {
                    return Ok(None);
                }
                match self.finish_line() {
                    Some(record) => return Ok(Some(record)),
                    None => continue,
                }
            }

            let (line, consumed, complete) = match chunk.iter().position(|b| *b == b'\n') {
                Some(i) => (&chunk[..i], i + 1, true),
                None => (chunk, chunk.len(), false),
            };

            if self.overflow > 0 || self.buf.len() + line.len() > self.max_frame_bytes {
                self.overflow += line.len();
            } else {
                self.buf.extend_from_slice(line);
            }
            self.inner.consume(consumed);

            if complete {
                if let Some(record) = self.finish_line() {
                    return Ok(Some(record));
                }
            }
        }
    }

    fn finish_line(&mut self) -> Option<Record> {
        if self.overflow > 0 {
            let seen = self.buf.len() + self.overflow;
            self.buf.clear();
            self.overflow = 0;
            return Some(Record::Oversized(seen));
        }

        let mut line = std::mem::take(&mut self.buf);
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if line.iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        Some(Record::Unit(line))
    }
}

//! Line-oriented access over chunked byte streams

use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use tokio::sync::mpsc;

/// A pull-based chunked byte stream.
#[async_trait]
pub trait ByteSource: Send {
    /// Next chunk of bytes, `None` at end of stream.
    async fn next_chunk(&mut self) -> io::Result<Option<Bytes>>;
}

/// The rendezvous hands the first upload across request tasks as a bounded
/// channel of chunks; the engine reads it like any other source.
#[async_trait]
impl ByteSource for mpsc::Receiver<io::Result<Bytes>> {
    async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        self.recv().await.transpose()
    }
}

/// A producer of decoded lines.
#[async_trait]
pub trait LineSource: Send {
    /// Next line with its trailing newline stripped, `None` at end of stream.
    async fn next_line(&mut self) -> io::Result<Option<String>>;
}

/// Splits a [`ByteSource`] into lines.
///
/// Chunk boundaries and line boundaries are unrelated; the partial line at the
/// end of a chunk is held back until its newline (or end of stream) arrives.
/// Decoding is per line and lossy, so one bad byte cannot poison the whole
/// comparison.
pub struct LineReader<S> {
    source: S,
    buf: Vec<u8>,
    /// Prefix of `buf` already scanned for a newline
    scanned: usize,
    eof: bool,
}

impl<S: ByteSource> LineReader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            buf: Vec::new(),
            scanned: 0,
            eof: false,
        }
    }

    fn take_line(&mut self, end: usize) -> String {
        let rest = self.buf.split_off(end + 1);
        let mut line = std::mem::replace(&mut self.buf, rest);
        line.pop(); // the newline itself
        self.scanned = 0;
        String::from_utf8_lossy(&line).into_owned()
    }
}

#[async_trait]
impl<S: ByteSource> LineSource for LineReader<S> {
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(offset) = self.buf[self.scanned..].iter().position(|&b| b == b'\n') {
                let end = self.scanned + offset;
                return Ok(Some(self.take_line(end)));
            }
            self.scanned = self.buf.len();

            if self.eof {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                // final line without a newline
                let line = std::mem::take(&mut self.buf);
                self.scanned = 0;
                return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
            }

            match self.source.next_chunk().await? {
                Some(chunk) => self.buf.extend_from_slice(&chunk),
                None => self.eof = true,
            }
        }
    }
}

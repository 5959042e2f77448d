//! `RunTask` response stream decoding
//!
//! Runners answer `RunTask` with newline-delimited JSON, one [`TaskFrame`]
//! per line. Chunks from the transport can split or merge lines arbitrarily.

use futures::{Stream, StreamExt};
use mlab_core::dto::task::TaskFrame;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::{Result, RunnerError};

/// Stream of frames produced by a running task
pub type TaskStream = Pin<Box<dyn Stream<Item = Result<TaskFrame>> + Send>>;

type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// Decodes newline-delimited frames out of a byte stream
pub struct FrameStream {
    bytes: ByteStream,
    buffer: Vec<u8>,
    /// Prefix of `buffer` already known to hold no newline
    scanned: usize,
    done: bool,
}

impl FrameStream {
    pub fn new<S, B>(bytes: S) -> Self
    where
        S: Stream<Item = Result<B>> + Send + 'static,
        B: AsRef<[u8]>,
    {
        Self {
            bytes: Box::pin(bytes.map(|chunk| chunk.map(|b| b.as_ref().to_vec()))),
            buffer: Vec::new(),
            scanned: 0,
            done: false,
        }
    }

    pub(crate) fn from_response(response: reqwest::Response) -> Self {
        Self::new(response.bytes_stream().map(|chunk| chunk.map_err(RunnerError::from)))
    }

    fn next_line(&mut self) -> Option<Vec<u8>> {
        let Some(offset) = self.buffer[self.scanned..].iter().position(|b| *b == b'\n') else {
            self.scanned = self.buffer.len();
            return None;
        };
        let end = self.scanned + offset;
        let mut line: Vec<u8> = self.buffer.drain(..=end).collect();
        self.scanned = 0;
        line.pop();
        Some(line)
    }
}

fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_whitespace)
}

fn parse_frame(line: &[u8]) -> Result<TaskFrame> {
    serde_json::from_slice(line)
        .map_err(|e| RunnerError::ParseError(format!("Invalid task frame: {}", e)))
}

impl Stream for FrameStream {
    type Item = Result<TaskFrame>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(line) = self.next_line() {
                if is_blank(&line) {
                    continue;
                }
                return Poll::Ready(Some(parse_frame(&line)));
            }

            if self.done {
                self.scanned = 0;
                if is_blank(&self.buffer) {
                    self.buffer.clear();
                    return Poll::Ready(None);
                }
                // Last frame without a trailing newline
                let rest = std::mem::take(&mut self.buffer);
                return Poll::Ready(Some(parse_frame(&rest)));
            }

            match self.bytes.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => self.buffer.extend_from_slice(&chunk),
                Poll::Ready(Some(Err(e))) => {
                    self.done = true;
                    self.buffer.clear();
                    self.scanned = 0;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => self.done = true,
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

//! Server-Sent Events support for push status delivery.
//!
//! The daemon's event endpoint emits one event per status change whose `data`
//! field carries a full session snapshot:
//!
//! ```text
//! : keepalive
//!
//! data: {"id":"abc","status":"running","total_checks":12,"completed_checks":3}
//!
//! ```

use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::{debug, warn};

use crate::domain::errors::ServiceError;
use crate::domain::models::DiscoverySession;

/// Parses an SSE byte stream into session snapshots
///
/// Bytes are buffered raw and a block is only decoded as UTF-8 once its
/// blank-line separator has arrived, so neither multi-byte characters nor
/// CRLF pairs split across chunks are damaged.
pub struct SseStreamParser {
    inner: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
    buffer: Vec<u8>,
    finished: bool,
}

impl SseStreamParser {
    /// Create a new SSE parser from a byte stream
    pub fn new(stream: impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static) -> Self {
        Self {
            inner: Box::pin(stream),
            buffer: Vec::new(),
            finished: false,
        }
    }

    /// Parse one event block; `None` for comments and events without data
    fn parse_event(block: &str) -> Option<Result<DiscoverySession, ServiceError>> {
        let data: Vec<&str> = block
            .lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(|value| value.strip_prefix(' ').unwrap_or(value))
            .collect();

        if data.is_empty() {
            return None;
        }

        let payload = data.join("\n");
        if payload.trim().is_empty() {
            return None;
        }

        match serde_json::from_str::<DiscoverySession>(&payload) {
            Ok(session) => Some(Ok(session)),
            Err(err) => {
                warn!(error = %err, "failed to parse discovery event");
                Some(Err(ServiceError::Decode(err.to_string())))
            }
        }
    }

    /// Take the next complete event block off the buffer, without its separator
    fn next_block(&mut self) -> Option<String> {
        let (end, separator) = find_separator(&self.buffer)?;
        let block = String::from_utf8_lossy(&self.buffer[..end]).into_owned();
        self.buffer.drain(..end + separator);
        Some(block)
    }
}

/// Position and length of the first blank line (`\n\n`, `\r\n\r\n` or `\r\r`).
fn find_separator(buffer: &[u8]) -> Option<(usize, usize)> {
    let mut line_start = 0;
    let mut i = 0;
    while i < buffer.len() {
        let eol = match buffer[i] {
            b'\n' => 1,
            b'\r' if buffer.get(i + 1) == Some(&b'\n') => 2,
            // A lone CR at the end may still be followed by LF
            b'\r' if i + 1 == buffer.len() => return None,
            b'\r' => 1,
            _ => {
                i += 1;
                continue;
            }
        };
        if i == line_start && line_start > 0 {
            return Some((line_start, eol));
        }
        i += eol;
        line_start = i;
    }
    None
}

impl Stream for SseStreamParser {
    type Item = Result<DiscoverySession, ServiceError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(block) = self.next_block() {
                if let Some(event) = Self::parse_event(&block) {
                    debug!(ok = event.is_ok(), "parsed discovery event");
                    return Poll::Ready(Some(event));
                }
                continue;
            }

            if self.finished {
                return Poll::Ready(None);
            }

            match self.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    self.buffer.extend_from_slice(&bytes);
                }
                Poll::Ready(Some(Err(err))) => {
                    return Poll::Ready(Some(Err(ServiceError::from(err))));
                }
                Poll::Ready(None) => {
                    self.finished = true;
                    let rest = std::mem::take(&mut self.buffer);
                    if let Some(event) = Self::parse_event(&String::from_utf8_lossy(&rest)) {
                        return Poll::Ready(Some(event));
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

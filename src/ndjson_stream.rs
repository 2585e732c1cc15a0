//! Stream adapter splitting a byte stream into newline-delimited lines.
//!
//! Used for the local daemon, which answers with one JSON object per line.
//! Lines (and UTF-8 characters) may be split across reads; the incomplete tail
//! is carried over until its newline arrives or the stream ends. A line that
//! outgrows [`MAX_LINE`] is dropped up to its newline and framing resumes on
//! the next one.

use crate::Error;
use futures_util::{Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

/// Upper bound on a single unterminated line.
const MAX_LINE: usize = 1 << 20;

/// Yields every non-blank line of the underlying byte stream, in order.
pub struct NdjsonStream<S> {
    inner: S,
    buffer: Vec<u8>,
    lines: VecDeque<String>,
    finished: bool,
    /// Dropping the rest of an oversized line until its newline.
    discarding: bool,
}

impl<S> NdjsonStream<S> {
    pub fn new(stream: S) -> Self {
        Self {
            inner: stream,
            buffer: Vec::new(),
            lines: VecDeque::new(),
            finished: false,
            discarding: false,
        }
    }

    fn push_line(&mut self, raw: &[u8]) {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        match std::str::from_utf8(raw) {
            Ok(line) if !line.trim().is_empty() => self.lines.push_back(line.to_string()),
            Ok(_) => {}
            Err(e) => tracing::debug!(error = %e, "skipping non UTF-8 line"),
        }
    }

    /// Queue every complete line and keep the unterminated tail.
    fn drain_lines(&mut self) {
        let buffer = std::mem::take(&mut self.buffer);
        let mut start = 0;

        for pos in memchr::memchr_iter(b'\n', &buffer) {
            if self.discarding {
                self.discarding = false;
            } else {
                self.push_line(&buffer[start..pos]);
            }
            start = pos + 1;
        }

        self.buffer = buffer;
        self.buffer.drain(..start);
    }
}

impl<S, E> Stream for NdjsonStream<S>
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    type Item = Result<String, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(line) = self.lines.pop_front() {
                return Poll::Ready(Some(Ok(line)));
            }

            if self.finished {
                return Poll::Ready(None);
            }

            match ready!(self.inner.poll_next_unpin(cx)) {
                Some(Ok(chunk)) => {
                    self.buffer.extend_from_slice(&chunk);
                    self.drain_lines();

                    if self.buffer.len() > MAX_LINE {
                        tracing::debug!(bytes = self.buffer.len(), "dropping oversized line");
                        self.buffer.clear();
                        self.discarding = true;
                    }
                }
                Some(Err(e)) => {
                    return Poll::Ready(Some(Err(Error::streaming(format!("Stream error: {e}")))));
                }
                None => {
                    // Give the unterminated tail one last chance
                    self.finished = true;
                    let tail = std::mem::take(&mut self.buffer);
                    if !self.discarding {
                        self.push_line(&tail);
                    }
                }
            }
        }
    }
}

/// Extension trait to add NDJSON line framing to byte streams.
pub trait NdjsonStreamExt: Stream {
    fn ndjson_lines(self) -> NdjsonStream<Self>
    where
        Self: Sized,
    {
        NdjsonStream::new(self)
    }
}

impl<S: Stream> NdjsonStreamExt for S {}

//! Stream adapter for parsing SSE (Server-Sent Events) from byte chunks.
//!
//! All three cloud vendors stream over SSE; only the JSON inside `data:` differs.

use crate::Error;
use futures_util::{Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

/// Upper bound on buffered, not yet framed bytes.
const MAX_BUFFER: usize = 1_000_000;

/// A Server-Sent Events (SSE) event.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    /// Event type (optional).
    pub event_type: Option<String>,
    /// Event data.
    pub data: String,
    /// Event ID (optional).
    pub id: Option<String>,
    /// Retry delay in milliseconds (optional).
    pub retry: Option<u64>,
}

impl SseEvent {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            event_type: None,
            data: data.into(),
            id: None,
            retry: None,
        }
    }

    /// Check if this is a "done" event (used by OpenAI to signal end of stream).
    pub fn is_done(&self) -> bool {
        self.data.trim() == "[DONE]"
    }

    /// Parse a single complete SSE event from its text representation.
    fn parse(event_text: &str) -> Option<SseEvent> {
        let mut event_type = None;
        let mut data_lines = Vec::new();
        let mut id = None;
        let mut retry = None;

        for line in event_text.lines() {
            // Only trim the end to keep intentional leading spaces in data
            let line = line.trim_end();
            if line.is_empty() || line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };

            match field {
                "event" => event_type = Some(value.to_string()),
                "data" => data_lines.push(value),
                "id" => id = Some(value.to_string()),
                "retry" => retry = value.parse().ok(),
                _ => {}
            }
        }

        if data_lines.is_empty() {
            return None;
        }

        Some(SseEvent {
            event_type,
            data: data_lines.join("\n"),
            id,
            retry,
        })
    }
}

/// Locate the blank line ending the first event: returns the event's end offset
/// and the length of the separator. Accepts `\n\n` and `\r\n\r\n`.
fn find_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    for pos in memchr::memchr_iter(b'\n', buffer) {
        match buffer.get(pos + 1) {
            Some(b'\n') => return Some((pos, 2)),
            Some(b'\r') if buffer.get(pos + 2) == Some(&b'\n') => return Some((pos, 3)),
            _ => {}
        }
    }
    None
}

/// A stream adapter that parses SSE events from a byte stream.
/// Events split across chunks are reassembled.
pub struct SseStream<S> {
    inner: S,
    buffer: Vec<u8>,
    events: VecDeque<SseEvent>,
    /// Set once `inner` has returned `None`; it is never polled again.
    finished: bool,
}

impl<S> SseStream<S> {
    pub fn new(stream: S) -> Self {
        Self {
            inner: stream,
            buffer: Vec::new(),
            events: VecDeque::new(),
            finished: false,
        }
    }

    /// Move every complete event from the byte buffer into the event queue.
    fn drain_events(&mut self) -> Result<(), Error> {
        let mut start = 0;

        while let Some((end, separator)) = find_boundary(&self.buffer[start..]) {
            let event_bytes = &self.buffer[start..start + end];
            let event_text = std::str::from_utf8(event_bytes)
                .map_err(|e| Error::streaming(format!("Invalid UTF-8 in SSE event: {e}")))?;

            if let Some(event) = SseEvent::parse(event_text) {
                self.events.push_back(event);
            }

            start += end + separator;
        }

        if start > 0 {
            self.buffer.drain(..start);
        }

        Ok(())
    }

    /// Parse whatever is left once the byte stream has ended.
    fn take_trailing_event(&mut self) -> Option<SseEvent> {
        let event = std::str::from_utf8(&self.buffer)
            .ok()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .and_then(SseEvent::parse);
        self.buffer.clear();
        event
    }
}

impl<S, E> Stream for SseStream<S>
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    type Item = Result<SseEvent, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(event) = self.events.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }

            if self.finished {
                return Poll::Ready(None);
            }

            let chunk = match ready!(self.inner.poll_next_unpin(cx)) {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => {
                    return Poll::Ready(Some(Err(Error::streaming(format!("Stream error: {e}")))));
                }
                None => {
                    self.finished = true;
                    // The last event may arrive without its closing blank line
                    return Poll::Ready(self.take_trailing_event().map(Ok));
                }
            };

            self.buffer.extend_from_slice(&chunk);

            if self.buffer.len() > MAX_BUFFER {
                self.buffer.clear();
                return Poll::Ready(Some(Err(Error::streaming(
                    "SSE buffer exceeded maximum size",
                ))));
            }

            if let Err(e) = self.drain_events() {
                return Poll::Ready(Some(Err(e)));
            }
        }
    }
}

/// Extension trait to add SSE parsing to byte streams.
pub trait SseStreamExt: Stream {
    /// Parse this byte stream as SSE events.
    fn sse_events(self) -> SseStream<Self>
    where
        Self: Sized,
    {
        SseStream::new(self)
    }
}

impl<S: Stream> SseStreamExt for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures_util::stream;

    /// Yields its chunks once and panics if polled after returning `None`.
    struct NoRepoll {
        chunks: VecDeque<Bytes>,
        ended: bool,
    }

    impl Stream for NoRepoll {
        type Item = Result<Bytes, std::io::Error>;

        fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
            assert!(!self.ended, "polled after completion");
            match self.chunks.pop_front() {
                Some(chunk) => Poll::Ready(Some(Ok(chunk))),
                None => {
                    self.ended = true;
                    Poll::Ready(None)
                }
            }
        }
    }

    fn chunks(parts: &[&[u8]]) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Unpin {
        stream::iter(
            parts
                .iter()
                .map(|p| Ok(Bytes::copy_from_slice(p)))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn test_events_split_across_chunks() {
        let mut sse = chunks(&[b"data: Hel", b"lo World\n\ndata: ", b"Second\n\n"]).sse_events();

        assert_eq!(sse.next().await.unwrap().unwrap().data, "Hello World");
        assert_eq!(sse.next().await.unwrap().unwrap().data, "Second");
        assert!(sse.next().await.is_none());
    }

    #[tokio::test]
    async fn test_crlf_separators() {
        let mut sse = chunks(&[b"event: message_start\r\ndata: {}\r\n\r\ndata: two\r\n\r\n"]).sse_events();

        let first = sse.next().await.unwrap().unwrap();
        assert_eq!(first.event_type.as_deref(), Some("message_start"));
        assert_eq!(first.data, "{}");
        assert_eq!(sse.next().await.unwrap().unwrap().data, "two");
        assert!(sse.next().await.is_none());
    }

    #[tokio::test]
    async fn test_multiline_data_and_fields() {
        let mut sse =
            chunks(&[b": keep-alive\nevent: custom\ndata: Line 1\ndata: Line 2\nid: 7\nretry: 300\n\n"])
                .sse_events();

        let event = sse.next().await.unwrap().unwrap();
        assert_eq!(event.event_type.as_deref(), Some("custom"));
        assert_eq!(event.data, "Line 1\nLine 2");
        assert_eq!(event.id.as_deref(), Some("7"));
        assert_eq!(event.retry, Some(300));
    }

    #[tokio::test]
    async fn test_utf8_split_across_chunks() {
        let euro = "€".as_bytes();
        let first = [b"data: Price: ".as_slice(), &euro[..2]].concat();
        let second = [&euro[2..], b"100\n\n".as_slice()].concat();
        let mut sse = chunks(&[first.as_slice(), second.as_slice()]).sse_events();

        assert_eq!(sse.next().await.unwrap().unwrap().data, "Price: €100");
        assert!(sse.next().await.is_none());
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_an_error() {
        let mut sse = chunks(&[b"data: bad \xFF\xFE bytes\n\n"]).sse_events();
        assert!(sse.next().await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_trailing_event_without_separator() {
        let mut sse = chunks(&[b"data: first\n\n", b"data: [DONE]"]).sse_events();

        assert_eq!(sse.next().await.unwrap().unwrap().data, "first");
        let last = sse.next().await.unwrap().unwrap();
        assert!(last.is_done());
        assert!(sse.next().await.is_none());
    }

    #[tokio::test]
    async fn test_source_not_polled_after_end() {
        let source = NoRepoll {
            chunks: VecDeque::from([Bytes::from_static(b"data: one\n\ndata: two")]),
            ended: false,
        };
        let mut sse = source.sse_events();

        assert_eq!(sse.next().await.unwrap().unwrap().data, "one");
        assert_eq!(sse.next().await.unwrap().unwrap().data, "two");
        assert!(sse.next().await.is_none());
        assert!(sse.next().await.is_none());
        assert!(sse.next().await.is_none());
    }
}

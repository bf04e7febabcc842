//! Frames a byte stream into Server-Sent Events.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use memchr::memmem;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use crate::Error;

/// Upper bound on buffered bytes for a single unterminated event.
const MAX_EVENT_BYTES: usize = 1_000_000;

/// A Server-Sent Events (SSE) event.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    /// The `event:` field, if present.
    pub event_type: Option<String>,
    /// All `data:` lines joined with `\n`.
    pub data: String,
}

/// A stream adapter that parses SSE events from a byte stream.
/// Events split across chunks are reassembled.
pub struct SseStream<S> {
    inner: S,
    buffer: Vec<u8>,
    events: VecDeque<SseEvent>,
    /// An unterminated event outgrew `MAX_EVENT_BYTES`; reported after queued events.
    overflowed: bool,
    finished: bool,
}

impl<S> SseStream<S> {
    pub fn new(stream: S) -> Self {
        Self {
            inner: stream,
            buffer: Vec::new(),
            events: VecDeque::new(),
            overflowed: false,
            finished: false,
        }
    }

    /// Append a chunk, normalizing CRLF line endings to LF.
    fn push_chunk(&mut self, chunk: &[u8]) {
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));
    }

    /// Move every complete event out of the buffer.
    fn drain_complete_events(&mut self) -> Result<(), Error> {
        let finder = memmem::Finder::new(b"\n\n");
        let mut start = 0;

        while let Some(pos) = finder.find(&self.buffer[start..]) {
            let end = start + pos;
            let text = std::str::from_utf8(&self.buffer[start..end])
                .map_err(|e| Error::streaming(format!("Invalid UTF-8 in SSE event: {e}")))?;
            if let Some(event) = parse_event(text) {
                self.events.push_back(event);
            }
            start = end + 2;
        }

        if start > 0 {
            self.buffer.drain(..start);
        }
        Ok(())
    }
}

/// Parse one event block (the text between blank lines).
fn parse_event(block: &str) -> Option<SseEvent> {
    let mut event_type = None;
    let mut data_lines = Vec::new();

    for line in block.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => event_type = Some(value.to_string()),
            "data" => data_lines.push(value),
            _ => {}
        }
    }

    if data_lines.is_empty() {
        return None;
    }

    Some(SseEvent {
        event_type,
        data: data_lines.join("\n"),
    })
}

impl<S> Stream for SseStream<S>
where
    S: Stream<Item = Result<Bytes, Error>> + Unpin,
{
    type Item = Result<SseEvent, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(event) = self.events.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if self.overflowed {
                self.overflowed = false;
                return Poll::Ready(Some(Err(Error::streaming(
                    "SSE buffer exceeded maximum size",
                ))));
            }
            if self.finished {
                return Poll::Ready(None);
            }

            match ready!(self.inner.poll_next_unpin(cx)) {
                Some(Ok(chunk)) => {
                    self.push_chunk(&chunk);
                    if let Err(e) = self.drain_complete_events() {
                        return Poll::Ready(Some(Err(e)));
                    }
                    if self.buffer.len() > MAX_EVENT_BYTES {
                        self.buffer.clear();
                        self.overflowed = true;
                    }
                }
                Some(Err(e)) => return Poll::Ready(Some(Err(e))),
                None => {
                    // The last event may arrive without its trailing blank line.
                    self.finished = true;
                    let rest = std::mem::take(&mut self.buffer);
                    match std::str::from_utf8(&rest) {
                        Ok(text) => {
                            if let Some(event) = parse_event(text.trim_end()) {
                                self.events.push_back(event);
                            }
                        }
                        Err(e) => {
                            return Poll::Ready(Some(Err(Error::streaming(format!(
                                "Invalid UTF-8 in SSE event: {e}"
                            )))));
                        }
                    }
                }
            }
        }
    }
}

/// Extension trait to add SSE parsing to byte streams.
pub trait SseStreamExt: Stream {
    fn sse_events(self) -> SseStream<Self>
    where
        Self: Sized,
    {
        SseStream::new(self)
    }
}

impl<S: Stream> SseStreamExt for S {}

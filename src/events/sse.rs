//! Server-sent events (`text/event-stream`) framing.
//!
//! [`SseParser`] turns text into frames; [`SseStream`] adapts a byte stream
//! (such as `reqwest::Response::bytes_stream`) into a stream of frames,
//! carrying UTF-8 sequences that are split across chunks.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio_stream::Stream;

use super::WatchError;

/// One dispatched SSE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Event name from `event:`, `message` when absent.
    pub event: String,
    /// `data:` lines joined with `\n`.
    pub data: String,
    /// Last `id:` seen in the frame.
    pub id: Option<String>,
}

impl Default for SseFrame {
    fn default() -> Self {
        Self {
            event: "message".to_owned(),
            data: String::new(),
            id: None,
        }
    }
}

/// Incremental SSE parser.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
    current: SseFrame,
    has_data: bool,
    bom_checked: bool,
}

impl SseParser {
    /// Create an empty parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed text and return every frame completed by it.
    pub fn feed(&mut self, text: &str) -> Vec<SseFrame> {
        self.buffer.push_str(text);

        if !self.bom_checked && !self.buffer.is_empty() {
            self.bom_checked = true;
            if let Some(rest) = self.buffer.strip_prefix('\u{FEFF}') {
                self.buffer = rest.to_owned();
            }
        }

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.find(|c: char| c == '\r' || c == '\n') {
            let rest = &self.buffer[pos..];
            let terminator = if rest.starts_with("\r\n") {
                2
            } else if rest == "\r" {
                // Might be the first half of a CRLF split across chunks.
                break;
            } else {
                1
            };

            let line: String = self.buffer.drain(..pos).collect();
            self.buffer.drain(..terminator);

            if line.is_empty() {
                frames.extend(self.dispatch());
            } else {
                self.process_line(&line);
            }
        }
        frames
    }

    /// Flush a trailing frame when the stream ends without a blank line.
    pub fn flush(&mut self) -> Option<SseFrame> {
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.process_line(line.trim_end_matches('\r'));
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) {
        if line.starts_with(':') {
            // Comment / keep-alive.
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.current.event = value.to_owned(),
            "data" => {
                self.current.data.push_str(value);
                self.current.data.push('\n');
                self.has_data = true;
            }
            "id" if !value.contains('\0') => self.current.id = Some(value.to_owned()),
            _ => {}
        }
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        if !self.has_data {
            self.current = SseFrame::default();
            return None;
        }
        let mut frame = std::mem::take(&mut self.current);
        if frame.data.ends_with('\n') {
            frame.data.pop();
        }
        if frame.event.is_empty() {
            frame.event = "message".to_owned();
        }
        self.has_data = false;
        Some(frame)
    }
}

/// Byte stream to SSE frame adapter.
pub struct SseStream<S> {
    inner: S,
    parser: SseParser,
    pending: VecDeque<SseFrame>,
    pending_error: Option<WatchError>,
    utf8_tail: Vec<u8>,
    finished: bool,
}

impl<S> SseStream<S> {
    /// Wrap a byte stream.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            parser: SseParser::new(),
            pending: VecDeque::new(),
            pending_error: None,
            utf8_tail: Vec::new(),
            finished: false,
        }
    }

    fn push_bytes(&mut self, bytes: &[u8]) {
        self.utf8_tail.extend_from_slice(bytes);
        let buf = std::mem::take(&mut self.utf8_tail);

        match std::str::from_utf8(&buf) {
            Ok(text) => self.pending.extend(self.parser.feed(text)),
            Err(err) => {
                let (valid, rest) = buf.split_at(err.valid_up_to());
                if let Ok(text) = std::str::from_utf8(valid) {
                    self.pending.extend(self.parser.feed(text));
                }
                if err.error_len().is_some() {
                    self.pending_error = Some(WatchError::Decode(format!(
                        "invalid UTF-8 in event stream: {err}"
                    )));
                } else {
                    self.utf8_tail = rest.to_vec();
                }
            }
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        if !self.utf8_tail.is_empty() {
            self.pending_error = Some(WatchError::Decode(
                "event stream ended inside a UTF-8 sequence".to_owned(),
            ));
            return;
        }
        self.pending.extend(self.parser.flush());
    }
}

impl<S, B> Stream for SseStream<S>
where
    S: Stream<Item = Result<B, reqwest::Error>> + Unpin,
    B: AsRef<[u8]>,
{
    type Item = Result<SseFrame, WatchError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            if let Some(frame) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(frame)));
            }
            if let Some(err) = this.pending_error.take() {
                this.finished = true;
                return Poll::Ready(Some(Err(err)));
            }
            if this.finished {
                return Poll::Ready(None);
            }

            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => this.push_bytes(chunk.as_ref()),
                Poll::Ready(Some(Err(err))) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(WatchError::Transport(err))));
                }
                Poll::Ready(None) => this.finish(),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

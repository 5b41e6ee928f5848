//! Fallback manual parser.
//!
//! A self-contained decoder that does not depend on the SSE framing crate:
//! raw bytes are buffered, records are cut at blank lines, and `data:`
//! payloads go through the same classification as the primary path.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use futures::stream::{self, Stream, StreamExt};

use crate::diagnostics::{DecodeObserver, Termination};
use crate::error::DecodeError;
use crate::interpret::classify;
use crate::model::{EventRecord, StreamUpdate};
use crate::sse::parse_sse_line;

const RECORD_DELIMITER: &[u8] = b"\n\n";

struct ManualParser<S> {
    /// Byte source; dropped as soon as the stream terminates.
    bytes: Option<Pin<Box<S>>>,
    /// Received bytes with line endings normalized to `\n`.
    buffer: Vec<u8>,
    /// Buffer offset below which no delimiter can start.
    scanned: usize,
    /// The last byte pushed was a `\r`, so a leading `\n` in the next chunk
    /// belongs to the same line ending.
    after_cr: bool,
    closed: bool,
    observer: Arc<dyn DecodeObserver>,
}

impl<S, B, E> ManualParser<S>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]> + Send,
    E: fmt::Display + Send,
{
    fn new(bytes: S, observer: Arc<dyn DecodeObserver>) -> Self {
        Self {
            bytes: Some(Box::pin(bytes)),
            buffer: Vec::new(),
            scanned: 0,
            after_cr: false,
            closed: false,
            observer,
        }
    }

    async fn next_update(&mut self) -> Option<StreamUpdate> {
        loop {
            if self.bytes.is_none() {
                return None;
            }

            match self.take_record() {
                Some(Ok(text)) => {
                    if let Some(update) = self.process(&text) {
                        return Some(update);
                    }
                    continue;
                }
                Some(Err(err)) => {
                    return Some(self.terminate(
                        StreamUpdate::failed(err.to_value()),
                        Termination::TransportError,
                    ));
                }
                None => {}
            }

            if self.closed {
                if !self.buffer.is_empty() {
                    tracing::debug!(
                        bytes = self.buffer.len(),
                        "discarding unterminated trailing record"
                    );
                }
                return Some(self.terminate(StreamUpdate::done(), Termination::Exhausted));
            }

            let bytes = self.bytes.as_mut()?;
            match bytes.next().await {
                Some(Ok(chunk)) => self.push(chunk.as_ref()),
                Some(Err(err)) => {
                    let err = DecodeError::Transport(err.to_string());
                    return Some(self.terminate(
                        StreamUpdate::failed(err.to_value()),
                        Termination::TransportError,
                    ));
                }
                None => self.closed = true,
            }
        }
    }

    /// Append a chunk, turning CRLF and lone CR line endings into `\n`.
    fn push(&mut self, chunk: &[u8]) {
        self.buffer.reserve(chunk.len());
        for &byte in chunk {
            match byte {
                b'\r' => {
                    self.buffer.push(b'\n');
                    self.after_cr = true;
                }
                b'\n' if self.after_cr => self.after_cr = false,
                _ => {
                    self.buffer.push(byte);
                    self.after_cr = false;
                }
            }
        }
    }

    /// Split off the next complete record.
    ///
    /// Only records closed by a blank line are returned; bytes left over when
    /// the source closes are never dispatched.
    fn take_record(&mut self) -> Option<Result<String, DecodeError>> {
        // A delimiter may straddle the previous scan boundary.
        let start = self.scanned.saturating_sub(RECORD_DELIMITER.len() - 1);
        let Some(pos) = self.buffer[start..]
            .windows(RECORD_DELIMITER.len())
            .position(|w| w == RECORD_DELIMITER)
            .map(|pos| start + pos)
        else {
            self.scanned = self.buffer.len();
            return None;
        };

        let record: Vec<u8> = self.buffer.drain(..pos + RECORD_DELIMITER.len()).collect();
        self.scanned = 0;
        let text = &record[..pos];
        Some(
            std::str::from_utf8(text)
                .map(str::to_string)
                .map_err(|err| DecodeError::Utf8(err.to_string())),
        )
    }

    /// Interpret one record. Returns `None` when nothing is emitted for it.
    fn process(&mut self, text: &str) -> Option<StreamUpdate> {
        let record = parse_record(text)?;
        self.observer.on_record(&record);

        match classify(&record.data) {
            Ok(Some(frame)) => {
                let (update, termination) = frame.into_update();
                match termination {
                    Some(reason) => Some(self.terminate(update, reason)),
                    None => {
                        self.observer.on_update(&update);
                        Some(update)
                    }
                }
            }
            Ok(None) => None,
            Err(err) => {
                self.observer.on_malformed(&record.data, &err);
                None
            }
        }
    }

    fn terminate(&mut self, update: StreamUpdate, reason: Termination) -> StreamUpdate {
        self.bytes = None;
        self.buffer.clear();
        self.scanned = 0;
        self.observer.on_terminated(reason);
        self.observer.on_update(&update);
        update
    }
}

/// Build a record from its raw lines. Records without a `data:` line are ignored.
fn parse_record(text: &str) -> Option<EventRecord> {
    let mut event = None;
    let mut data: Option<String> = None;

    for line in text.lines() {
        if let Some(value) = parse_sse_line(line) {
            match data.as_mut() {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => data = Some(value.to_string()),
            }
        } else if let Some(value) = line.strip_prefix("event:") {
            event = Some(value.trim().to_string());
        }
    }

    Some(EventRecord {
        event: event.filter(|e| !e.is_empty() && e != "message"),
        data: data?,
    })
}

/// Decode a byte stream into updates without the SSE framing crate.
///
/// Like the primary path, the output always ends with exactly one terminal
/// update, including when the source closes without `[DONE]`. A record that
/// is not valid UTF-8 ends the stream with an error update.
pub fn decode<S, B, E>(
    bytes: S,
    observer: Arc<dyn DecodeObserver>,
) -> impl Stream<Item = StreamUpdate> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    stream::unfold(ManualParser::new(bytes, observer), |mut parser| async move {
        let update = parser.next_update().await?;
        Some((update, parser))
    })
}

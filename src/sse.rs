//! Server-Sent Events (SSE) framing.
//!
//! This module turns a raw byte stream into [`EventRecord`]s using the
//! `eventsource-stream` crate, and provides the small line helpers shared
//! with the fallback parser.
//!
//! SSE format:
//! ```text
//! data: {"delta": "Hel"}
//!
//! data: {"delta": "lo"}
//!
//! data: [DONE]
//! ```

use std::fmt;

use eventsource_stream::{EventStreamError, Eventsource};
use futures::stream::{BoxStream, Stream, StreamExt};

use crate::error::DecodeError;
use crate::model::{EventRecord, StreamUpdate};
use crate::options::DecoderOptions;

/// Event type the SSE format assigns when a record has no `event:` field.
const DEFAULT_EVENT: &str = "message";

/// Decode a byte stream into event records.
///
/// Transport errors and framing failures are yielded as `Err` items; the
/// delta interpreter turns them into the terminal update.
pub fn records<S, B, E>(bytes: S) -> impl Stream<Item = Result<EventRecord, DecodeError>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    bytes.eventsource().map(|result| match result {
        Ok(event) => Ok(EventRecord {
            event: Some(event.event).filter(|e| !e.is_empty() && e != DEFAULT_EVENT),
            data: event.data,
        }),
        Err(EventStreamError::Transport(err)) => Err(DecodeError::Transport(err.to_string())),
        Err(EventStreamError::Utf8(err)) => Err(DecodeError::Utf8(err.to_string())),
        Err(EventStreamError::Parser(err)) => Err(DecodeError::Framing(err.to_string())),
    })
}

/// Extension trait for `reqwest::Response` to decode SSE bodies.
///
/// # Example
/// ```ignore
/// use deltastream::options::DecoderOptions;
/// use deltastream::sse::SseResponseExt;
///
/// let response = client.post("https://api.example.com/chat").send().await?;
///
/// let mut updates = response.updates(&DecoderOptions::default());
/// while let Some(update) = updates.next().await {
///     print!("{}", update.value);
/// }
/// ```
pub trait SseResponseExt {
    /// Convert the response body into a stream of raw event records.
    fn records(self) -> impl Stream<Item = Result<EventRecord, DecodeError>> + Send;

    /// Convert the response body into stream updates using the full pipeline.
    fn updates(self, options: &DecoderOptions) -> BoxStream<'static, StreamUpdate>;
}

impl SseResponseExt for reqwest::Response {
    fn records(self) -> impl Stream<Item = Result<EventRecord, DecodeError>> + Send {
        records(self.bytes_stream())
    }

    fn updates(self, options: &DecoderOptions) -> BoxStream<'static, StreamUpdate> {
        crate::stream::decode(self.bytes_stream(), options)
    }
}

/// Parse an SSE line to extract the data portion.
///
/// SSE lines are in the format: `data: <content>`. The space after the
/// colon is optional.
///
/// # Example
/// ```
/// use deltastream::sse::parse_sse_line;
///
/// let line = "data: {\"key\": \"value\"}";
/// assert_eq!(parse_sse_line(line), Some("{\"key\": \"value\"}"));
///
/// let line = "invalid";
/// assert_eq!(parse_sse_line(line), None);
/// ```
pub fn parse_sse_line(line: &str) -> Option<&str> {
    line.strip_prefix("data:")
        .map(|s| s.strip_prefix(' ').unwrap_or(s))
}

/// Check if an SSE data payload indicates the stream is done.
///
/// Matches `[DONE]` and anything that starts with it after trimming.
///
/// # Example
/// ```
/// use deltastream::sse::is_done_marker;
///
/// assert!(is_done_marker("[DONE]"));
/// assert!(is_done_marker(" [DONE]\n"));
/// assert!(!is_done_marker(""));
/// assert!(!is_done_marker("{\"data\": \"value\"}"));
/// ```
pub fn is_done_marker(data: &str) -> bool {
    data.trim().starts_with("[DONE]")
}

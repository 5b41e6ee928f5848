//! Error types for stream decoding.

use serde_json::Value;
use thiserror::Error;

/// Errors that can occur while decoding a response stream.
///
/// None of these escape the update stream as `Err` items: transport and
/// framing failures end the stream with an error-carrying terminal update,
/// payload failures are reported to the observer and the frame is dropped.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid UTF-8 in stream: {0}")]
    Utf8(String),

    #[error("SSE framing error: {0}")]
    Framing(String),

    #[error("JSON parse error: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Update received after the terminal update")]
    AfterTerminal,
}

impl DecodeError {
    /// The value placed in the `error` field of a terminal update.
    pub fn to_value(&self) -> Value {
        Value::String(self.to_string())
    }
}

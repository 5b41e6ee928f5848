//! Consumer-side accumulation of stream updates into a chat message.

use futures::{Stream, StreamExt};
use serde_json::Value;

use crate::error::DecodeError;
use crate::model::{StreamUpdate, Usage};

/// The message being built from a stream of updates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    text: String,
    usage: Vec<Usage>,
    error: Option<Value>,
    done: bool,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain a stream of updates into a transcript.
    ///
    /// Stops at the terminal update even if the stream would yield more.
    pub async fn collect<S>(updates: S) -> Self
    where
        S: Stream<Item = StreamUpdate>,
    {
        futures::pin_mut!(updates);

        let mut transcript = Self::new();
        while let Some(update) = updates.next().await {
            if transcript.apply(update).is_err() || transcript.done {
                break;
            }
        }
        transcript
    }

    /// Apply one update.
    ///
    /// Fails with [`DecodeError::AfterTerminal`] once the terminal update has
    /// been applied; the transcript is left unchanged in that case.
    pub fn apply(&mut self, update: StreamUpdate) -> Result<(), DecodeError> {
        if self.done {
            return Err(DecodeError::AfterTerminal);
        }

        self.text.push_str(&update.value);
        if let Some(usage) = update.usage {
            self.usage.push(usage);
        }
        if update.error.is_some() {
            self.error = update.error;
        }
        self.done = update.done;
        Ok(())
    }

    /// Message text received so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Usage reports, in arrival order.
    pub fn usage(&self) -> &[Usage] {
        &self.usage
    }

    pub fn error(&self) -> Option<&Value> {
        self.error.as_ref()
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Whether the stream ended with an error the UI should display.
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

//! Diagnostic hooks for the decoding pipeline.
//!
//! Instrumentation is injected through [`DecodeObserver`] instead of being
//! hard-coded in the decoders. The default observer forwards everything to
//! `tracing`.

use crate::error::DecodeError;
use crate::model::{EventRecord, StreamUpdate};

/// Why a stream reached its terminal update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The origin sent `[DONE]`.
    Sentinel,
    /// The payload carried an `error` field.
    UpstreamError,
    /// The transport or the framing layer failed.
    TransportError,
    /// The byte stream closed without a sentinel.
    Exhausted,
}

/// Receives diagnostic callbacks from the decoders.
///
/// All methods default to no-ops, so implementors only override what they need.
pub trait DecodeObserver: Send + Sync {
    /// A record was decoded from the byte stream.
    fn on_record(&self, _record: &EventRecord) {}

    /// A record was dropped because its payload could not be interpreted.
    fn on_malformed(&self, _data: &str, _error: &DecodeError) {}

    /// An update is about to be handed to the consumer.
    fn on_update(&self, _update: &StreamUpdate) {}

    /// The stream terminated.
    fn on_terminated(&self, _reason: Termination) {}
}

/// Observer that emits `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl DecodeObserver for TracingObserver {
    fn on_record(&self, record: &EventRecord) {
        tracing::trace!(event = ?record.event, len = record.data.len(), "sse record");
    }

    fn on_malformed(&self, data: &str, error: &DecodeError) {
        tracing::warn!(%error, data, "dropping malformed sse frame");
    }

    fn on_update(&self, update: &StreamUpdate) {
        tracing::trace!(
            done = update.done,
            len = update.value.len(),
            usage = update.usage.is_some(),
            error = update.error.is_some(),
            "stream update"
        );
    }

    fn on_terminated(&self, reason: Termination) {
        match reason {
            Termination::TransportError | Termination::UpstreamError => {
                tracing::warn!(?reason, "stream terminated with error")
            }
            _ => tracing::debug!(?reason, "stream terminated"),
        }
    }
}

/// Observer that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentObserver;

impl DecodeObserver for SilentObserver {}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records every callback, for asserting on diagnostics in tests.
    #[derive(Default)]
    pub struct RecordingObserver {
        pub malformed: Mutex<Vec<String>>,
        pub terminations: Mutex<Vec<Termination>>,
        pub records: Mutex<usize>,
    }

    impl DecodeObserver for RecordingObserver {
        fn on_record(&self, _record: &EventRecord) {
            *self.records.lock().unwrap() += 1;
        }

        fn on_malformed(&self, data: &str, _error: &DecodeError) {
            self.malformed.lock().unwrap().push(data.to_string());
        }

        fn on_terminated(&self, reason: Termination) {
            self.terminations.lock().unwrap().push(reason);
        }
    }
}

//! Delta interpreter: event records to stream updates.
//!
//! Each record's payload is classified as a termination sentinel, an
//! upstream error, a usage report or a text delta. Payloads that are not
//! JSON are dropped without ending the stream.

use std::pin::Pin;
use std::sync::Arc;

use futures::stream::{self, Stream, StreamExt};
use serde_json::Value;

use crate::diagnostics::{DecodeObserver, Termination};
use crate::error::DecodeError;
use crate::model::{EventRecord, StreamUpdate, Usage};
use crate::sse::is_done_marker;

/// Meaning of a single record payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Explicit end of stream from the origin.
    Done,
    /// The origin reported a failure.
    Error(Value),
    /// Token accounting; does not end the stream.
    Usage(Usage),
    /// Text to append, possibly empty.
    Delta(String),
}

impl Frame {
    /// The update this frame produces, and the termination it causes, if any.
    pub fn into_update(self) -> (StreamUpdate, Option<Termination>) {
        match self {
            Frame::Done => (StreamUpdate::done(), Some(Termination::Sentinel)),
            Frame::Error(error) => (
                StreamUpdate::failed(error),
                Some(Termination::UpstreamError),
            ),
            Frame::Usage(usage) => (StreamUpdate::usage(usage), None),
            Frame::Delta(text) => (StreamUpdate::delta(text), None),
        }
    }
}

/// Classify a record payload.
///
/// Returns `Ok(None)` for empty payloads, which carry nothing to emit.
///
/// # Example
/// ```
/// use deltastream::interpret::{classify, Frame};
///
/// let frame = classify(r#"{"choices":[{"delta":{"content":"Hi"}}]}"#).unwrap();
/// assert_eq!(frame, Some(Frame::Delta("Hi".to_string())));
///
/// assert_eq!(classify("[DONE]").unwrap(), Some(Frame::Done));
/// assert!(classify("{not json").is_err());
/// ```
pub fn classify(data: &str) -> Result<Option<Frame>, DecodeError> {
    if data.is_empty() {
        return Ok(None);
    }
    if is_done_marker(data) {
        return Ok(Some(Frame::Done));
    }

    let payload: Value = serde_json::from_str(data)?;

    if let Some(error) = field(&payload, "error") {
        return Ok(Some(Frame::Error(error.clone())));
    }
    if let Some(usage) = field(&payload, "usage") {
        return Ok(Some(Frame::Usage(Usage::from(usage.clone()))));
    }

    Ok(Some(Frame::Delta(delta_text(&payload).to_string())))
}

/// A non-null top-level field.
fn field<'a>(payload: &'a Value, name: &str) -> Option<&'a Value> {
    payload.get(name).filter(|v| !v.is_null())
}

/// First of `choices[0].delta.content`, `delta`, `value` that is a string.
fn delta_text(payload: &Value) -> &str {
    payload
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .or_else(|| payload.get("delta").and_then(Value::as_str))
        .or_else(|| payload.get("value").and_then(Value::as_str))
        .unwrap_or_default()
}

struct Interpreter<S> {
    /// Record source; dropped as soon as the stream terminates.
    records: Option<Pin<Box<S>>>,
    observer: Arc<dyn DecodeObserver>,
}

impl<S> Interpreter<S>
where
    S: Stream<Item = Result<EventRecord, DecodeError>>,
{
    async fn next_update(&mut self) -> Option<StreamUpdate> {
        let records = self.records.as_mut()?;

        loop {
            let (update, termination) = match records.next().await {
                Some(Ok(record)) => {
                    self.observer.on_record(&record);
                    match classify(&record.data) {
                        Ok(Some(frame)) => frame.into_update(),
                        Ok(None) => continue,
                        Err(err) => {
                            self.observer.on_malformed(&record.data, &err);
                            continue;
                        }
                    }
                }
                Some(Err(err)) => (
                    StreamUpdate::failed(err.to_value()),
                    Some(Termination::TransportError),
                ),
                None => (StreamUpdate::done(), Some(Termination::Exhausted)),
            };

            if let Some(reason) = termination {
                self.records = None;
                self.observer.on_terminated(reason);
            }
            self.observer.on_update(&update);
            return Some(update);
        }
    }
}

/// Interpret a stream of event records.
///
/// The output always ends with exactly one terminal update: on `[DONE]`, on
/// an upstream `error`, on a record source error, or when the source runs
/// dry. The source is not polled again once the terminal update is produced.
pub fn interpret<S>(
    records: S,
    observer: Arc<dyn DecodeObserver>,
) -> impl Stream<Item = StreamUpdate> + Send
where
    S: Stream<Item = Result<EventRecord, DecodeError>> + Send + 'static,
{
    let interpreter = Interpreter {
        records: Some(Box::pin(records)),
        observer,
    };

    stream::unfold(interpreter, |mut interpreter| async move {
        let update = interpreter.next_update().await?;
        Some((update, interpreter))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::testing::RecordingObserver;
    use crate::diagnostics::SilentObserver;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn records(items: Vec<Result<EventRecord, DecodeError>>) -> impl Stream<Item = Result<EventRecord, DecodeError>> + Send {
        stream::iter(items)
    }

    fn data(s: &str) -> Result<EventRecord, DecodeError> {
        Ok(EventRecord::data(s))
    }

    #[test]
    fn test_classify_shapes() {
        assert_eq!(
            classify(r#"{"delta":"Hello"}"#).unwrap(),
            Some(Frame::Delta("Hello".to_string()))
        );
        assert_eq!(
            classify(r#"{"value":"World"}"#).unwrap(),
            Some(Frame::Delta("World".to_string()))
        );
        assert_eq!(
            classify(r#"{"unexpected":true}"#).unwrap(),
            Some(Frame::Delta(String::new()))
        );
        assert_eq!(classify("").unwrap(), None);
        assert_eq!(classify("  [DONE]  ").unwrap(), Some(Frame::Done));
    }

    #[test]
    fn test_classify_precedence() {
        // content beats delta beats value
        let frame = classify(
            r#"{"choices":[{"delta":{"content":"a"}}],"delta":"b","value":"c"}"#,
        )
        .unwrap();
        assert_eq!(frame, Some(Frame::Delta("a".to_string())));

        let frame = classify(r#"{"choices":[{"delta":{"content":null}}],"delta":"b"}"#).unwrap();
        assert_eq!(frame, Some(Frame::Delta("b".to_string())));

        let frame = classify(r#"{"delta":null,"value":"c"}"#).unwrap();
        assert_eq!(frame, Some(Frame::Delta("c".to_string())));

        // error beats usage beats text
        let frame = classify(r#"{"error":"boom","usage":{"total_tokens":1},"delta":"x"}"#).unwrap();
        assert_eq!(frame, Some(Frame::Error(json!("boom"))));

        let frame = classify(r#"{"usage":{"total_tokens":1},"delta":"x"}"#).unwrap();
        assert!(matches!(frame, Some(Frame::Usage(u)) if u.total_tokens == Some(1)));

        // usage that does not fit the typed counts is still a usage report
        let frame = classify(r#"{"usage":{"prompt_tokens":"10","total_tokens":15}}"#).unwrap();
        assert!(matches!(frame, Some(Frame::Usage(u)) if u.total_tokens == Some(15)
            && u.extra.get("prompt_tokens") == Some(&json!("10"))));

        let frame = classify(r#"{"usage":5,"delta":"x"}"#).unwrap();
        assert!(matches!(frame, Some(Frame::Usage(u)) if u.extra.get("usage") == Some(&json!(5))));

        // null error and usage are absent
        let frame = classify(r#"{"error":null,"usage":null,"delta":"x"}"#).unwrap();
        assert_eq!(frame, Some(Frame::Delta("x".to_string())));
    }

    #[tokio::test]
    async fn test_delta_then_done() {
        let updates: Vec<_> = interpret(
            records(vec![data(r#"{"delta":"Hello"}"#), data("[DONE]")]),
            Arc::new(SilentObserver),
        )
        .collect()
        .await;

        assert_eq!(updates, vec![StreamUpdate::delta("Hello"), StreamUpdate::done()]);
    }

    #[tokio::test]
    async fn test_exhaustion_forces_terminal_update() {
        let updates: Vec<_> = interpret(
            records(vec![data(r#"{"delta":"a"}"#), data(r#"{"delta":"b"}"#)]),
            Arc::new(SilentObserver),
        )
        .collect()
        .await;

        assert_eq!(
            updates,
            vec![
                StreamUpdate::delta("a"),
                StreamUpdate::delta("b"),
                StreamUpdate::done()
            ]
        );
    }

    #[tokio::test]
    async fn test_malformed_frame_is_dropped() {
        let observer = Arc::new(RecordingObserver::default());
        let updates: Vec<_> = interpret(
            records(vec![
                data(r#"{"delta":"one "}"#),
                data(r#"{"delta": broken"#),
                data(r#"{"delta":"two"}"#),
                data("[DONE]"),
            ]),
            observer.clone(),
        )
        .collect()
        .await;

        assert_eq!(
            updates,
            vec![
                StreamUpdate::delta("one "),
                StreamUpdate::delta("two"),
                StreamUpdate::done()
            ]
        );
        assert_eq!(*observer.malformed.lock().unwrap(), vec![r#"{"delta": broken"#]);
        assert_eq!(*observer.records.lock().unwrap(), 4);
        assert_eq!(*observer.terminations.lock().unwrap(), vec![Termination::Sentinel]);
    }

    #[tokio::test]
    async fn test_usage_does_not_terminate() {
        let updates: Vec<_> = interpret(
            records(vec![
                data(r#"{"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#),
                data(r#"{"delta":"after"}"#),
            ]),
            Arc::new(SilentObserver),
        )
        .collect()
        .await;

        assert_eq!(updates.len(), 3);
        let usage = updates[0].usage.as_ref().unwrap();
        assert!(!updates[0].done);
        assert_eq!(updates[0].value, "");
        assert_eq!(usage.prompt_tokens, Some(10));
        assert_eq!(usage.completion_tokens, Some(5));
        assert_eq!(usage.total_tokens, Some(15));
        assert_eq!(updates[1], StreamUpdate::delta("after"));
        assert_eq!(updates[2], StreamUpdate::done());
    }

    #[tokio::test]
    async fn test_irregular_usage_is_emitted() {
        let updates: Vec<_> = interpret(
            records(vec![
                data(r#"{"usage":{"prompt_tokens":"10","total_tokens":15}}"#),
                data(r#"{"usage":{"total_tokens":-1}}"#),
                data("[DONE]"),
            ]),
            Arc::new(SilentObserver),
        )
        .collect()
        .await;

        assert_eq!(updates.len(), 3);
        assert_eq!(updates[0].usage.as_ref().unwrap().total_tokens, Some(15));
        assert_eq!(
            updates[1].usage.as_ref().unwrap().extra.get("total_tokens"),
            Some(&json!(-1))
        );
        assert_eq!(updates[2], StreamUpdate::done());
    }

    #[tokio::test]
    async fn test_error_stops_reading_source() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = pulled.clone();
        let source = stream::iter(vec![
            r#"{"error":"rate_limited"}"#,
            r#"{"delta":"never"}"#,
            "[DONE]",
        ])
        .map(move |s| {
            counter.fetch_add(1, Ordering::SeqCst);
            data(s)
        });

        let updates: Vec<_> = interpret(source, Arc::new(SilentObserver)).collect().await;

        assert_eq!(updates, vec![StreamUpdate::failed(json!("rate_limited"))]);
        assert_eq!(pulled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_source_error_becomes_terminal_update() {
        let observer = Arc::new(RecordingObserver::default());
        let updates: Vec<_> = interpret(
            records(vec![
                data(r#"{"delta":"partial"}"#),
                Err(DecodeError::Transport("reset".to_string())),
                data(r#"{"delta":"never"}"#),
            ]),
            observer.clone(),
        )
        .collect()
        .await;

        assert_eq!(
            updates,
            vec![
                StreamUpdate::delta("partial"),
                StreamUpdate::failed(json!("Transport error: reset"))
            ]
        );
        assert_eq!(
            *observer.terminations.lock().unwrap(),
            vec![Termination::TransportError]
        );
    }

    #[tokio::test]
    async fn test_empty_records_are_skipped() {
        let updates: Vec<_> = interpret(
            records(vec![data(""), data(r#"{"delta":"x"}"#), data("[DONE]")]),
            Arc::new(SilentObserver),
        )
        .collect()
        .await;

        assert_eq!(updates, vec![StreamUpdate::delta("x"), StreamUpdate::done()]);
    }
}

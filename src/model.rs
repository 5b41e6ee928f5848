//! Data models shared by the decoding stages.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single server-sent event record.
///
/// Produced by the event decoder (or the fallback parser) and consumed
/// immediately by the delta interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    /// Event type tag. `None` for the default `message` type.
    pub event: Option<String>,

    /// Data payload, with multiple `data:` lines joined by `\n`.
    pub data: String,
}

impl EventRecord {
    /// Create a record with the default event type.
    pub fn data(data: impl Into<String>) -> Self {
        Self {
            event: None,
            data: data.into(),
        }
    }
}

/// Token usage information.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt tokens used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,

    /// Completion tokens generated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,

    /// Total tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,

    /// Any other accounting fields the origin reports, kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl From<Value> for Usage {
    /// Build a usage report from the payload's `usage` field.
    ///
    /// Never fails: counts that are not non-negative integers stay in `extra`
    /// under their own key, and a report that is not an object is kept whole
    /// as `extra["usage"]`.
    fn from(value: Value) -> Self {
        let mut fields = match value {
            Value::Object(fields) => fields,
            other => {
                let mut extra = Map::new();
                extra.insert("usage".to_string(), other);
                return Self {
                    extra,
                    ..Self::default()
                };
            }
        };

        let prompt_tokens = take_count(&mut fields, "prompt_tokens");
        let completion_tokens = take_count(&mut fields, "completion_tokens");
        let total_tokens = take_count(&mut fields, "total_tokens");
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens,
            extra: fields,
        }
    }
}

fn take_count(fields: &mut Map<String, Value>, name: &str) -> Option<u64> {
    let count = fields.get(name).and_then(Value::as_u64)?;
    fields.remove(name);
    Some(count)
}

/// One update of the decoded stream.
///
/// Exactly one update per stream has `done == true`, and it is the last.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamUpdate {
    pub done: bool,

    /// Text delta to append to the message. Empty on usage and terminal updates.
    pub value: String,

    /// Failure reported by the origin or the transport. Only set on the terminal update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,

    /// Token accounting. Only set on non-terminal updates with an empty `value`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl StreamUpdate {
    /// A non-terminal text delta.
    pub fn delta(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    /// A non-terminal usage report.
    pub fn usage(usage: Usage) -> Self {
        Self {
            usage: Some(usage),
            ..Self::default()
        }
    }

    /// The terminal update of a successful stream.
    pub fn done() -> Self {
        Self {
            done: true,
            ..Self::default()
        }
    }

    /// The terminal update of a failed stream.
    pub fn failed(error: Value) -> Self {
        Self {
            done: true,
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.done
    }

    /// Whether this update carries message text (as opposed to usage or termination).
    pub fn is_text(&self) -> bool {
        !self.done && self.error.is_none() && self.usage.is_none()
    }
}

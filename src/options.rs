//! Configuration for the decoding pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::diagnostics::{DecodeObserver, TracingObserver};

/// Reports whether the consuming context is currently visible.
///
/// The chunk splitter skips its delays while the consumer is in the
/// background so that background timers are not starved.
pub trait ForegroundProbe: Send + Sync {
    fn is_foreground(&self) -> bool;
}

/// Probe for non-UI contexts: always foreground.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysForeground;

impl ForegroundProbe for AlwaysForeground {
    fn is_foreground(&self) -> bool {
        true
    }
}

impl<F> ForegroundProbe for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_foreground(&self) -> bool {
        self()
    }
}

/// Which decoder turns bytes into updates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecoderKind {
    /// `eventsource-stream` framing followed by the delta interpreter.
    #[default]
    Primary,
    /// Self-contained manual parser over raw bytes.
    Fallback,
}

impl DecoderKind {
    /// Pick the decoder from an on/off switch such as an environment
    /// variable. Only `1`, `true`, `yes` and `on` (any case) select the
    /// fallback parser; anything else, including an unset switch, keeps
    /// the primary decoder.
    pub fn from_fallback_switch(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("1" | "true" | "yes" | "on") => DecoderKind::Fallback,
            _ => DecoderKind::Primary,
        }
    }
}

/// Options for the chunk splitter.
///
/// # Example
/// ```rust
/// use deltastream::options::SmoothingOptions;
/// use std::time::Duration;
///
/// let options = SmoothingOptions::default()
///     .with_delay(Duration::from_millis(10))
///     .with_seed(7);
/// assert_eq!(options.threshold, 5);
/// assert_eq!(options.max_piece, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingOptions {
    /// Deltas shorter than this many characters pass through unchanged
    pub threshold: usize,

    /// Upper bound on the length of each piece, in characters
    pub max_piece: usize,

    /// Pause between consecutive pieces of one delta
    pub delay: Duration,

    /// Seed for piece lengths; random when unset
    pub seed: Option<u64>,
}

impl Default for SmoothingOptions {
    fn default() -> Self {
        Self {
            threshold: 5,
            max_piece: 3,
            delay: Duration::from_millis(5),
            seed: None,
        }
    }
}

impl SmoothingOptions {
    /// Set the pass-through threshold.
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the maximum piece length. Values below 1 are treated as 1.
    pub fn with_max_piece(mut self, max_piece: usize) -> Self {
        self.max_piece = max_piece;
        self
    }

    /// Set the delay between pieces.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Make piece lengths reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Options for [`crate::stream::decode`].
///
/// # Example
/// ```rust
/// use deltastream::options::{DecoderKind, DecoderOptions, SmoothingOptions};
///
/// let options = DecoderOptions::new()
///     .with_kind(DecoderKind::Fallback)
///     .with_smoothing(SmoothingOptions::default())
///     .with_foreground(|| true);
/// assert_eq!(options.kind, DecoderKind::Fallback);
/// ```
#[derive(Clone)]
pub struct DecoderOptions {
    /// Decoder used for framing and interpretation
    pub kind: DecoderKind,

    /// Chunk splitter settings; splitting is disabled when `None`
    pub smoothing: Option<SmoothingOptions>,

    /// Diagnostics sink
    pub observer: Arc<dyn DecodeObserver>,

    /// Visibility of the consumer, consulted by the chunk splitter
    pub foreground: Arc<dyn ForegroundProbe>,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            kind: DecoderKind::Primary,
            smoothing: None,
            observer: Arc::new(TracingObserver),
            foreground: Arc::new(AlwaysForeground),
        }
    }
}

impl fmt::Debug for DecoderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoderOptions")
            .field("kind", &self.kind)
            .field("smoothing", &self.smoothing)
            .finish_non_exhaustive()
    }
}

impl DecoderOptions {
    /// Create options with the primary decoder, no smoothing and `tracing` diagnostics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the decoder.
    pub fn with_kind(mut self, kind: DecoderKind) -> Self {
        self.kind = kind;
        self
    }

    /// Enable the chunk splitter.
    pub fn with_smoothing(mut self, smoothing: SmoothingOptions) -> Self {
        self.smoothing = Some(smoothing);
        self
    }

    /// Replace the diagnostics observer.
    pub fn with_observer(mut self, observer: impl DecodeObserver + 'static) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    /// Replace the foreground probe.
    pub fn with_foreground(mut self, probe: impl ForegroundProbe + 'static) -> Self {
        self.foreground = Arc::new(probe);
        self
    }
}

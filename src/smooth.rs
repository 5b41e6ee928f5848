//! Chunk splitter for a smoother typing effect.
//!
//! Long text deltas are cut into short pieces emitted with a small pause
//! between them. Usage, error and terminal updates pass through untouched
//! and without delay. The concatenated text is never altered.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, Stream, StreamExt};

use crate::model::StreamUpdate;
use crate::options::{ForegroundProbe, SmoothingOptions};

struct Splitter<S> {
    updates: Pin<Box<S>>,
    /// Remainder of the delta currently being split.
    pending: Option<String>,
    rng: fastrand::Rng,
    options: SmoothingOptions,
    foreground: Arc<dyn ForegroundProbe>,
}

impl<S> Splitter<S>
where
    S: Stream<Item = StreamUpdate>,
{
    async fn next_update(&mut self) -> Option<StreamUpdate> {
        if let Some(rest) = self.pending.take() {
            if let Some(delay) = self.pause() {
                tokio::time::sleep(delay).await;
            }
            return Some(self.cut(rest));
        }

        let update = self.updates.next().await?;
        if !update.is_text()
            || update.value.is_empty()
            || update.value.chars().count() < self.options.threshold
        {
            return Some(update);
        }
        Some(self.cut(update.value))
    }

    /// Delay before the next piece; none while the consumer is in the background.
    fn pause(&self) -> Option<Duration> {
        Some(self.options.delay).filter(|d| !d.is_zero() && self.foreground.is_foreground())
    }

    /// Emit a random-length prefix of `text` and keep the rest pending.
    fn cut(&mut self, mut text: String) -> StreamUpdate {
        let remaining = text.chars().count();
        let max = self.options.max_piece.clamp(1, remaining.max(1));
        let len = self.rng.usize(1..=max);

        let split = text
            .char_indices()
            .nth(len)
            .map_or(text.len(), |(idx, _)| idx);
        let rest = text.split_off(split);
        if !rest.is_empty() {
            self.pending = Some(rest);
        }
        StreamUpdate::delta(text)
    }
}

/// Re-chunk long text deltas into pieces of `1..=max_piece` characters.
pub fn smooth<S>(
    updates: S,
    options: SmoothingOptions,
    foreground: Arc<dyn ForegroundProbe>,
) -> impl Stream<Item = StreamUpdate> + Send
where
    S: Stream<Item = StreamUpdate> + Send + 'static,
{
    let rng = match options.seed {
        Some(seed) => fastrand::Rng::with_seed(seed),
        None => fastrand::Rng::new(),
    };
    let splitter = Splitter {
        updates: Box::pin(updates),
        pending: None,
        rng,
        options,
        foreground,
    };

    stream::unfold(splitter, |mut splitter| async move {
        let update = splitter.next_update().await?;
        Some((update, splitter))
    })
}

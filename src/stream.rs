//! Pipeline entry point: bytes in, stream updates out.

use std::fmt;

use futures::stream::{BoxStream, Stream, StreamExt};

use crate::options::{DecoderKind, DecoderOptions};
use crate::{fallback, interpret, sse, smooth};

pub use crate::model::StreamUpdate;

/// Decode an SSE byte stream into stream updates.
///
/// The returned stream is lazy and single-pass. It always ends with exactly
/// one update where `done == true`; dropping it early releases the byte
/// source.
///
/// # Example
/// ```
/// use bytes::Bytes;
/// use deltastream::options::DecoderOptions;
/// use deltastream::stream::{decode, StreamUpdate};
/// use futures::{stream, StreamExt};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let body = stream::iter(vec![
///     Ok::<_, std::io::Error>(Bytes::from_static(b"data: {\"delta\":\"Hello\"}\n\n")),
///     Ok(Bytes::from_static(b"data: [DONE]\n\n")),
/// ]);
///
/// let updates: Vec<_> = decode(body, &DecoderOptions::default()).collect().await;
/// assert_eq!(updates, vec![StreamUpdate::delta("Hello"), StreamUpdate::done()]);
/// # });
/// ```
pub fn decode<S, B, E>(bytes: S, options: &DecoderOptions) -> BoxStream<'static, StreamUpdate>
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let updates = match options.kind {
        DecoderKind::Primary => {
            interpret::interpret(sse::records(bytes), options.observer.clone()).boxed()
        }
        DecoderKind::Fallback => fallback::decode(bytes, options.observer.clone()).boxed(),
    };

    match &options.smoothing {
        Some(smoothing) => {
            smooth::smooth(updates, smoothing.clone(), options.foreground.clone()).boxed()
        }
        None => updates,
    }
}

//! # deltastream - streaming chat response decoder
//!
//! Turns a chunked Server-Sent Events response body into an ordered stream
//! of text deltas for a conversational UI.
//!
//! ## Features
//! - Async-first, tokio compatible
//! - SSE framing via `eventsource-stream`, with a self-contained fallback parser
//! - Accepts completion-API (`choices[0].delta.content`) and plain
//!   (`delta` / `value`) payloads, plus `usage` and `error` reports
//! - Optional chunk splitting for a smoother typing effect
//! - Diagnostics through an injectable observer, `tracing` by default
//!
//! ## Pipeline
//!
//! 1. **`sse`**: bytes to event records
//! 2. **`interpret`**: event records to [`StreamUpdate`]s
//! 3. **`smooth`** (optional): long deltas split into short pieces
//!
//! **`fallback`** replaces the first two stages with a manual parser.
//! Every stream ends with exactly one update where `done == true`.
//!
//! ## Example
//! ```no_run
//! use deltastream::options::{DecoderOptions, SmoothingOptions};
//! use deltastream::sse::SseResponseExt;
//! use deltastream::Transcript;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let response = reqwest::Client::new()
//!         .post("https://chat.example.com/api/stream")
//!         .json(&serde_json::json!({"prompt": "Hello!"}))
//!         .send()
//!         .await?;
//!
//!     let options = DecoderOptions::new().with_smoothing(SmoothingOptions::default());
//!     let transcript = Transcript::collect(response.updates(&options)).await;
//!
//!     println!("{}", transcript.text());
//!     Ok(())
//! }
//! ```

pub mod diagnostics;
pub mod error;
pub mod fallback;
pub mod interpret;
pub mod model;
pub mod options;
pub mod smooth;
pub mod sse;
pub mod stream;
pub mod transcript;

// Re-exports for convenience
pub use error::DecodeError;
pub use model::{EventRecord, StreamUpdate, Usage};
pub use options::{DecoderKind, DecoderOptions, SmoothingOptions};
pub use stream::decode;
pub use transcript::Transcript;

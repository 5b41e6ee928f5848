//! Stream a chat completion and print the deltas as they arrive.
//!
//! Run with:
//! ```bash
//! export OPENAI_API_KEY="your-api-key"
//! cargo run --example stream_chat -- "Write a haiku about Rust programming."
//! ```
//!
//! Set `DELTASTREAM_FALLBACK=1` to use the manual parser and `RUST_LOG=debug`
//! to see decoder diagnostics.

use std::io::Write;

use deltastream::options::{DecoderKind, DecoderOptions, SmoothingOptions};
use deltastream::sse::SseResponseExt;
use futures::StreamExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let api_key =
        std::env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY environment variable must be set");
    let prompt = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Write a haiku about Rust programming.".to_string());

    let response = reqwest::Client::new()
        .post("https://api.openai.com/v1/chat/completions")
        .bearer_auth(api_key)
        .json(&serde_json::json!({
            "model": "gpt-4o-mini",
            "stream": true,
            "stream_options": {"include_usage": true},
            "messages": [{"role": "user", "content": prompt}],
        }))
        .send()
        .await?
        .error_for_status()?;

    let kind =
        DecoderKind::from_fallback_switch(std::env::var("DELTASTREAM_FALLBACK").ok().as_deref());
    let options = DecoderOptions::new()
        .with_kind(kind)
        .with_smoothing(SmoothingOptions::default());

    let mut updates = response.updates(&options);
    while let Some(update) = updates.next().await {
        if let Some(error) = update.error {
            eprintln!("\nError in stream: {}", error);
            break;
        }
        if let Some(usage) = update.usage {
            eprintln!("\n\n=== Usage: {} total tokens ===", usage.total_tokens.unwrap_or(0));
            continue;
        }

        print!("{}", update.value);
        std::io::stdout().flush()?;
    }
    println!();

    Ok(())
}

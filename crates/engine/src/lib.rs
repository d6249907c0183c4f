//! Upstream collaborators: Gemini text and speech, background dispatch, audio output.

mod dispatch;
mod gemini;
mod output;
pub mod pcm;

pub use dispatch::{Completion, Dispatcher, MutedSpeech};
pub use gemini::{DEFAULT_BASE_URL, GeminiClient, GeminiConfig, build_prompt};
pub use output::CpalSink;

/// Reads the API key from `GEMINI_API_KEY`, then `API_KEY`.
pub fn api_key_from_env() -> Option<String> {
    ["GEMINI_API_KEY", "API_KEY"]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

// src/analyzer/provider/mod.rs
// One request/response shape per chat-API family, selected by configuration
// at construction time.

use reqwest::{Client, RequestBuilder};
use serde_json::Value;

use crate::config::LimnerConfig;
use crate::error::{LimnerError, Result};

pub mod claude;
pub mod gemini;
pub mod openai;

pub use claude::ClaudeProvider;
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;

/// A chat-completion API shape the analyzer can talk to.
pub trait ChatProvider: std::fmt::Debug + Send + Sync {
    /// Provider name for logging/debugging
    fn name(&self) -> &'static str;

    /// Build the analysis request carrying `prompt`.
    fn build_request(&self, client: &Client, prompt: &str) -> RequestBuilder;

    /// Pull the model's free-text answer out of the response envelope.
    fn extract_text(&self, body: &Value) -> Result<String>;
}

/// Select the provider variant named in the configuration.
pub fn from_config(config: &LimnerConfig) -> Result<Box<dyn ChatProvider>> {
    match config.ai_provider.as_str() {
        "openai" => Ok(Box::new(OpenAiProvider::new(config))),
        "claude" => Ok(Box::new(ClaudeProvider::new(config))),
        "gemini" => Ok(Box::new(GeminiProvider::new(config))),
        other => Err(LimnerError::UnsupportedProvider(other.to_string())),
    }
}

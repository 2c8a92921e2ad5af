// src/analyzer/provider/openai.rs
// Chat-completions shape with bearer-token auth. Also covers OpenAI-compatible
// proxies pointed at by `ai_base_url`.

use reqwest::{Client, RequestBuilder};
use serde_json::{Value, json};

use super::ChatProvider;
use crate::config::LimnerConfig;
use crate::error::{LimnerError, Result};

#[derive(Debug)]
pub struct OpenAiProvider {
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(config: &LimnerConfig) -> Self {
        Self {
            api_key: config.ai_api_key.clone(),
            model: config.ai_model.clone(),
            base_url: config.ai_base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl ChatProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn build_request(&self, client: &Client, prompt: &str) -> RequestBuilder {
        client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": self.model,
                "messages": [{"role": "user", "content": prompt}],
            }))
    }

    fn extract_text(&self, body: &Value) -> Result<String> {
        body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                LimnerError::MalformedResponse(
                    "no choices[0].message.content in chat completion".to_string(),
                )
            })
    }
}

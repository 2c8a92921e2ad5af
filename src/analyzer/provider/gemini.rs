// src/analyzer/provider/gemini.rs
// Gemini generateContent shape: API key travels as a query parameter.

use reqwest::{Client, RequestBuilder};
use serde_json::{Value, json};

use super::ChatProvider;
use crate::config::LimnerConfig;
use crate::error::{LimnerError, Result};

#[derive(Debug)]
pub struct GeminiProvider {
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(config: &LimnerConfig) -> Self {
        Self {
            api_key: config.ai_api_key.clone(),
            model: config.ai_model.clone(),
            base_url: config.ai_base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl ChatProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn build_request(&self, client: &Client, prompt: &str) -> RequestBuilder {
        client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, self.model
            ))
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({
                "contents": [{"parts": [{"text": prompt}]}],
            }))
    }

    fn extract_text(&self, body: &Value) -> Result<String> {
        body["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                LimnerError::MalformedResponse(
                    "no candidates[0].content.parts[0].text in Gemini response".to_string(),
                )
            })
    }
}

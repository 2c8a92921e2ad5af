// src/analyzer/provider/claude.rs
// Anthropic Messages API shape: x-api-key + version header.

use reqwest::{Client, RequestBuilder};
use serde_json::{Value, json};

use super::ChatProvider;
use crate::config::LimnerConfig;
use crate::error::{LimnerError, Result};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

#[derive(Debug)]
pub struct ClaudeProvider {
    api_key: String,
    model: String,
    base_url: String,
}

impl ClaudeProvider {
    pub fn new(config: &LimnerConfig) -> Self {
        Self {
            api_key: config.ai_api_key.clone(),
            model: config.ai_model.clone(),
            base_url: config.ai_base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl ChatProvider for ClaudeProvider {
    fn name(&self) -> &'static str {
        "claude"
    }

    fn build_request(&self, client: &Client, prompt: &str) -> RequestBuilder {
        client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&json!({
                "model": self.model,
                "max_tokens": MAX_TOKENS,
                "messages": [{"role": "user", "content": prompt}],
            }))
    }

    fn extract_text(&self, body: &Value) -> Result<String> {
        body["content"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                LimnerError::MalformedResponse("no content[0].text in Claude response".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> ClaudeProvider {
        let mut config = LimnerConfig::default();
        config.ai_api_key = "key-test".to_string();
        config.ai_model = "claude-3-opus-20240229".to_string();
        config.ai_base_url = "https://api.anthropic.com/v1".to_string();
        ClaudeProvider::new(&config)
    }

    #[test]
    fn builds_messages_request() {
        let client = Client::new();
        let request = provider().build_request(&client, "hi").build().unwrap();

        assert_eq!(request.url().as_str(), "https://api.anthropic.com/v1/messages");
        assert_eq!(request.headers().get("x-api-key").unwrap(), "key-test");
        assert_eq!(
            request.headers().get("anthropic-version").unwrap(),
            ANTHROPIC_VERSION
        );

        let body: Value =
            serde_json::from_slice(request.body().unwrap().as_bytes().unwrap()).unwrap();
        assert_eq!(body["max_tokens"], 1024);
        assert_eq!(body["messages"][0]["content"], "hi");
    }

    #[test]
    fn extracts_message_text() {
        let body = json!({"content": [{"type": "text", "text": "answer"}]});
        assert_eq!(provider().extract_text(&body).unwrap(), "answer");
    }

    #[test]
    fn missing_text_is_malformed() {
        let body = json!({"content": []});
        assert!(matches!(
            provider().extract_text(&body),
            Err(LimnerError::MalformedResponse(_))
        ));
    }
}

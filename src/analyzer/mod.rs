//! Suggestion analysis: ask a secondary model where a reply deserves
//! illustrations and what to draw there.
//!
//! One HTTP round trip per call, no internal retry — the orchestrator owns
//! the retry budget.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::LimnerConfig;
use crate::error::{LimnerError, Result};

pub mod provider;

use provider::ChatProvider;

/// One analyzer recommendation: place one image after one sentence.
#[derive(Debug, Clone, Deserialize)]
pub struct Suggestion {
    pub index: usize,
    pub prompt: String,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default = "default_score")]
    pub score: f32,
}

fn default_score() -> f32 {
    1.0
}

#[derive(Debug, Deserialize)]
struct AnalysisEnvelope {
    positions: Vec<Suggestion>,
}

/// Port the orchestrator analyzes replies through.
#[async_trait]
pub trait ReplyAnalyzer: Send + Sync {
    async fn analyze(&self, reply_text: &str) -> Result<Vec<Suggestion>>;
}

pub struct SuggestionAnalyzer {
    client: Client,
    provider: Box<dyn ChatProvider>,
    template: String,
}

impl SuggestionAnalyzer {
    pub fn new(config: &LimnerConfig) -> Result<Self> {
        let provider = provider::from_config(config)?;
        let client = config.http_client()?;
        Ok(Self {
            client,
            provider,
            template: config.prompt_template.clone(),
        })
    }
}

#[async_trait]
impl ReplyAnalyzer for SuggestionAnalyzer {
    async fn analyze(&self, reply_text: &str) -> Result<Vec<Suggestion>> {
        let prompt = self.template.replace("{{reply}}", reply_text);
        debug!(provider = self.provider.name(), "requesting insertion suggestions");

        let response = self
            .provider
            .build_request(&self.client, &prompt)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LimnerError::Transport {
                service: "analysis API",
                status,
                body,
            });
        }

        let body: Value = response.json().await?;
        let answer = self.provider.extract_text(&body)?;
        parse_suggestions(&answer)
    }
}

/// Parse the model's free-text answer into suggestions. Tolerates a fenced
/// code block around the JSON object.
pub(crate) fn parse_suggestions(answer: &str) -> Result<Vec<Suggestion>> {
    let stripped = strip_code_fences(answer);
    let envelope: AnalysisEnvelope = serde_json::from_str(stripped)
        .map_err(|e| LimnerError::MalformedResponse(format!("{e} in analyzer answer: {stripped}")))?;
    Ok(envelope.positions)
}

fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string line (```json)
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    let rest = rest.trim_end();
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

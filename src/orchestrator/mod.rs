//! The control loop around one finished chat reply:
//! analyze → filter by score → generate → composite, with a bounded
//! whole-pass retry. Exhausting the budget leaves the reply untouched.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analyzer::{ReplyAnalyzer, Suggestion};
use crate::compositor::Compositor;
use crate::config::LimnerConfig;
use crate::error::{LimnerError, Result};
use crate::generator::ImageService;
use crate::notify::Notifier;

/// One chat reply under processing. The host owns the chat history; the
/// orchestrator mutates the text in place and hands ownership back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply {
    pub text: String,
    #[serde(default)]
    pub is_user: bool,
    #[serde(default)]
    pub character_avatar: Option<String>,
}

/// What a pass did, reported back to the host adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Gating turned the pass off before it started.
    Skipped,
    /// The pass ran but no suggestion survived the score filter.
    Unchanged,
    /// Images were inserted and the reply text was rewritten.
    Modified,
    /// Every attempt failed; the original text stands.
    Fallback,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Unchanged => "unchanged",
            Self::Modified => "modified",
            Self::Fallback => "fallback",
        }
    }
}

pub struct Orchestrator {
    config: Arc<LimnerConfig>,
    analyzer: Arc<dyn ReplyAnalyzer>,
    images: Arc<dyn ImageService>,
    compositor: Compositor,
    notifier: Arc<dyn Notifier>,
}

impl Orchestrator {
    pub fn new(
        config: Arc<LimnerConfig>,
        analyzer: Arc<dyn ReplyAnalyzer>,
        images: Arc<dyn ImageService>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            analyzer,
            images,
            compositor: Compositor::new(),
            notifier,
        }
    }

    /// Auto-trigger entry point, called once per rendered reply.
    pub async fn handle(&self, reply: &mut Reply) -> Outcome {
        if !self.config.enabled || !self.config.auto_trigger || reply.is_user {
            return Outcome::Skipped;
        }
        self.run(reply).await
    }

    /// Manual trigger (slash command / button). Only the master switch applies.
    pub async fn run(&self, reply: &mut Reply) -> Outcome {
        if !self.config.enabled {
            return Outcome::Skipped;
        }

        let mut retries_left = self.config.retry_count;
        loop {
            match self.attempt(reply).await {
                Ok(modified) => {
                    if modified == reply.text {
                        return Outcome::Unchanged;
                    }
                    reply.text = modified;
                    self.notify_success("Images inserted");
                    return Outcome::Modified;
                }
                Err(err) => {
                    self.notify_error(&err, retries_left);
                    if !err.is_retryable() || retries_left == 0 {
                        self.notify_warning("Falling back to the original reply");
                        return Outcome::Fallback;
                    }
                    retries_left -= 1;
                }
            }
        }
    }

    /// One whole attempt, always restarted from the analyzer. Insertion
    /// indices are interpreted against the text as it stands after prior
    /// insertions in this pass.
    async fn attempt(&self, reply: &Reply) -> Result<String> {
        if self.config.verbose {
            self.notifier.info("Analyzing reply");
        }
        let suggestions = self.analyzer.analyze(&reply.text).await?;
        let accepted: Vec<Suggestion> = suggestions
            .into_iter()
            .filter(|s| s.score >= self.config.min_score)
            .collect();
        debug!(accepted = accepted.len(), "suggestions after score filter");

        let mut text = reply.text.clone();
        for suggestion in &accepted {
            let full_prompt = self.full_prompt(suggestion);
            let url = self
                .images
                .generate(
                    &full_prompt,
                    suggestion.style.as_deref(),
                    reply.character_avatar.as_deref(),
                )
                .await?;
            text = self
                .compositor
                .insert_image(&text, suggestion.index, &url, &full_prompt);
        }
        Ok(text)
    }

    /// Suggestion prompt, optional style, then the configured default suffix.
    fn full_prompt(&self, suggestion: &Suggestion) -> String {
        let mut prompt = suggestion.prompt.clone();
        if let Some(style) = suggestion.style.as_deref() {
            if !style.is_empty() {
                prompt.push_str(", ");
                prompt.push_str(style);
            }
        }
        if !self.config.default_styles.is_empty() {
            prompt.push_str(", ");
            prompt.push_str(&self.config.default_styles);
        }
        prompt
    }

    fn notify_success(&self, message: &str) {
        if self.config.verbose {
            self.notifier.success(message);
        } else {
            debug!("{message}");
        }
    }

    fn notify_warning(&self, message: &str) {
        if self.config.verbose {
            self.notifier.warning(message);
        } else {
            debug!("{message}");
        }
    }

    fn notify_error(&self, err: &LimnerError, retries_left: u32) {
        if self.config.verbose {
            self.notifier
                .error(&format!("Error: {err}. Retries left: {retries_left}"));
        } else {
            debug!(error = %err, "illustration attempt failed");
        }
    }
}

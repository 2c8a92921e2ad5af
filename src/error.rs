// src/error.rs
// Error taxonomy for the illustration pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LimnerError {
    #[error("unsupported AI provider '{0}' (expected openai, claude, or gemini)")]
    UnsupportedProvider(String),

    #[error("{service} error {status}: {body}")]
    Transport {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("img2img requested but no base image is configured or supplied")]
    MissingBaseImage,

    #[error("image job {prompt_id} did not complete within {timeout_secs}s")]
    PollTimeout {
        prompt_id: String,
        timeout_secs: u64,
    },

    #[error("failed to load workflow from {path}: {reason}")]
    WorkflowLoad { path: String, reason: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl LimnerError {
    /// Static configuration faults cannot be fixed by retrying the pass.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::UnsupportedProvider(_) | Self::MissingBaseImage
        )
    }
}

pub type Result<T> = std::result::Result<T, LimnerError>;

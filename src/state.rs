// src/state.rs
// Shared application state and component assembly.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::analyzer::{ReplyAnalyzer, SuggestionAnalyzer};
use crate::config::LimnerConfig;
use crate::generator::ComfyGenerator;
use crate::notify::TracingNotifier;
use crate::orchestrator::{Orchestrator, Reply};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<LimnerConfig>,
    pub orchestrator: Arc<Orchestrator>,
    // Kept separately so the connectivity probe can exercise the analysis
    // API without going through the whole pipeline.
    pub analyzer: Arc<dyn ReplyAnalyzer>,
    // Most recent reply seen, for the manual rerun command.
    pub last_reply: Arc<Mutex<Option<Reply>>>,
}

/// Wire the real components together. Trait seams stay open for tests.
pub fn build_state(config: Arc<LimnerConfig>) -> anyhow::Result<AppState> {
    let analyzer: Arc<dyn ReplyAnalyzer> = Arc::new(SuggestionAnalyzer::new(&config)?);
    let images = Arc::new(ComfyGenerator::new(config.clone())?);
    let notifier = Arc::new(TracingNotifier);

    let orchestrator = Arc::new(Orchestrator::new(
        config.clone(),
        analyzer.clone(),
        images,
        notifier,
    ));

    Ok(AppState {
        config,
        orchestrator,
        analyzer,
        last_reply: Arc::new(Mutex::new(None)),
    })
}

// src/main.rs

use std::sync::Arc;

use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use limner::api::http::router;
use limner::config::LimnerConfig;
use limner::state;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Arc::new(LimnerConfig::from_env());

    // Initialize tracing
    let level = config.log_level.parse::<Level>().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting limner (reply illustration sidecar)");
    info!("Analysis provider: {} ({})", config.ai_provider, config.ai_model);
    info!("ComfyUI: {}", config.comfy_url);
    info!(
        "Auto-trigger: {}",
        if config.auto_trigger { "enabled" } else { "disabled" }
    );

    let app_state = state::build_state(config.clone())?;
    let app = router(app_state);

    let bind_address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Host adapter listening on http://{}", bind_address);

    axum::serve(listener, app).await?;
    Ok(())
}

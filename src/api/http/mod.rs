// src/api/http/mod.rs
// HTTP host adapter: the reply-rendered event, the manual rerun command,
// and a connectivity probe. This is the surface the chat host wires into.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tracing::info;

use crate::orchestrator::{Outcome, Reply};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/reply", post(reply_rendered))
        .route("/api/rerun", post(rerun_last))
        .route("/api/test", get(test_connections))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
pub struct ReplyResponse {
    pub text: String,
    pub modified: bool,
    pub outcome: &'static str,
}

impl ReplyResponse {
    fn new(reply: &Reply, outcome: Outcome) -> Self {
        Self {
            text: reply.text.clone(),
            modified: outcome == Outcome::Modified,
            outcome: outcome.as_str(),
        }
    }
}

/// The "reply rendered" event. Runs one orchestration pass and returns the
/// (possibly rewritten) text for the host to re-render.
async fn reply_rendered(
    State(state): State<AppState>,
    Json(mut reply): Json<Reply>,
) -> Json<ReplyResponse> {
    let outcome = state.orchestrator.handle(&mut reply).await;
    info!(outcome = outcome.as_str(), "reply pass finished");
    let response = ReplyResponse::new(&reply, outcome);
    *state.last_reply.lock().await = Some(reply);
    Json(response)
}

/// Manual trigger: rerun the orchestration for the most recent reply.
async fn rerun_last(
    State(state): State<AppState>,
) -> Result<Json<ReplyResponse>, StatusCode> {
    let mut guard = state.last_reply.lock().await;
    let Some(reply) = guard.as_mut() else {
        return Err(StatusCode::NOT_FOUND);
    };
    let outcome = state.orchestrator.run(reply).await;
    info!(outcome = outcome.as_str(), "manual rerun finished");
    Ok(Json(ReplyResponse::new(reply, outcome)))
}

#[derive(Debug, Serialize)]
pub struct TestReport {
    pub analysis_api: bool,
    pub comfyui: bool,
}

/// Probe both external services, mirroring the host's "Test Connections"
/// button. The analysis probe performs one real (tiny) analyze call.
async fn test_connections(State(state): State<AppState>) -> Json<TestReport> {
    let analysis_api = state.analyzer.analyze("test").await.is_ok();

    let comfyui = match state.config.http_client() {
        Ok(client) => client
            .get(state.config.comfy_endpoint("/object_info"))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false),
        Err(_) => false,
    };

    Json(TestReport {
        analysis_api,
        comfyui,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    use crate::analyzer::{ReplyAnalyzer, Suggestion};
    use crate::config::LimnerConfig;
    use crate::error::Result as LimnerResult;
    use crate::generator::ImageService;
    use crate::notify::TracingNotifier;
    use crate::orchestrator::Orchestrator;

    struct EmptyAnalyzer;

    #[async_trait]
    impl ReplyAnalyzer for EmptyAnalyzer {
        async fn analyze(&self, _reply_text: &str) -> LimnerResult<Vec<Suggestion>> {
            Ok(vec![])
        }
    }

    struct NoImages;

    #[async_trait]
    impl ImageService for NoImages {
        async fn generate(
            &self,
            _prompt: &str,
            _style: Option<&str>,
            _avatar: Option<&str>,
        ) -> LimnerResult<String> {
            Ok("http://unused.local/img.png".to_string())
        }
    }

    fn test_state() -> AppState {
        let config = Arc::new(LimnerConfig::default());
        let analyzer: Arc<dyn ReplyAnalyzer> = Arc::new(EmptyAnalyzer);
        let orchestrator = Arc::new(Orchestrator::new(
            config.clone(),
            analyzer.clone(),
            Arc::new(NoImages),
            Arc::new(TracingNotifier),
        ));
        AppState {
            config,
            orchestrator,
            analyzer,
            last_reply: Arc::new(Mutex::new(None)),
        }
    }

    async fn post_json(router: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn healthz_is_ok() {
        let response = router(test_state())
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn user_reply_is_skipped() {
        let (status, body) = post_json(
            router(test_state()),
            "/api/reply",
            json!({"text": "Hello.", "is_user": true}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "skipped");
        assert_eq!(body["modified"], false);
        assert_eq!(body["text"], "Hello.");
    }

    #[tokio::test]
    async fn empty_suggestions_leave_text_unchanged() {
        let (status, body) = post_json(
            router(test_state()),
            "/api/reply",
            json!({"text": "A cat sat. The end.", "is_user": false}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "unchanged");
        assert_eq!(body["text"], "A cat sat. The end.");
    }

    #[tokio::test]
    async fn rerun_without_a_reply_is_not_found() {
        let response = router(test_state())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/rerun")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn rerun_uses_the_stored_reply() {
        let state = test_state();
        let app = router(state.clone());

        let (_, _) = post_json(
            app.clone(),
            "/api/reply",
            json!({"text": "Stored reply.", "is_user": false}),
        )
        .await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/rerun")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["text"], "Stored reply.");
    }
}

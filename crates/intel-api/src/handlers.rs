//! Route handler functions for all API endpoints.

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use intel_chat::{ToolInvocation, TurnState};
use intel_core::types::{ChatMessage, EvidenceRecord};
use intel_ui::evidence::{render, RenderFormat};

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request / response types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub turn_id: Uuid,
    pub message_id: Uuid,
    pub reply: String,
    pub created_at: DateTime<Utc>,
    pub tool_invocations: Vec<ToolInvocation>,
    pub evidence_updated: bool,
    pub rounds: usize,
    pub states: Vec<TurnState>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub session_id: Uuid,
    pub message_count: usize,
    pub has_evidence: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub session_id: Uuid,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResetResponse {
    pub session_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct EvidenceTableParams {
    pub format: Option<String>,
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /health - answers from the snapshot, never waits on a turn.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let summary = state.snapshot().summary;
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        session_id: summary.id,
        message_count: summary.message_count,
        has_evidence: summary.has_evidence,
    })
}

/// GET /ui - serve the embedded chat page.
pub async fn ui() -> impl IntoResponse {
    Html(intel_ui::dashboard::DASHBOARD_HTML)
}

/// POST /chat - run one turn.
///
/// The session lock is held for the whole turn, so concurrent turns queue
/// behind it. A failed turn still reports whether its tool call replaced
/// the evidence, so clients can show the table anyway.
pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let mut session = state.session.lock().await;
    let revision = session.evidence_revision();
    let result = state
        .orchestrator
        .handle_turn(&mut session, &req.message)
        .await;
    state.publish(&session);
    let outcome = result.map_err(|e| {
        ApiError::from(e).with_evidence_updated(session.evidence_revision() != revision)
    })?;

    Ok(Json(ChatResponse {
        turn_id: outcome.turn_id,
        message_id: outcome.reply.id,
        reply: outcome.reply.content,
        created_at: outcome.reply.created_at,
        tool_invocations: outcome.tool_invocations,
        evidence_updated: outcome.evidence_updated,
        rounds: outcome.rounds,
        states: outcome.states,
    }))
}

/// GET /history - the committed transcript, from the snapshot.
pub async fn history(State(state): State<AppState>) -> Json<HistoryResponse> {
    let snapshot = state.snapshot();
    Json(HistoryResponse {
        session_id: snapshot.summary.id,
        messages: snapshot.transcript,
    })
}

/// GET /evidence - the evidence record, `null` when none was captured.
pub async fn evidence(State(state): State<AppState>) -> Json<Option<EvidenceRecord>> {
    let session = state.session.lock().await;
    Json(session.evidence().cloned())
}

/// GET /evidence/table?format=html|markdown|terminal
pub async fn evidence_table(
    State(state): State<AppState>,
    Query(params): Query<EvidenceTableParams>,
) -> Result<Response, ApiError> {
    let format = match params.format.as_deref() {
        None => RenderFormat::Html,
        Some(raw) => raw.parse::<RenderFormat>().map_err(ApiError::BadRequest)?,
    };

    let session = state.session.lock().await;
    let rendered = render(session.evidence(), format);

    Ok(match format {
        RenderFormat::Html => Html(rendered).into_response(),
        RenderFormat::Markdown => (
            [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
            rendered,
        )
            .into_response(),
        RenderFormat::Terminal => rendered.into_response(),
    })
}

/// POST /session/reset
pub async fn reset_session(State(state): State<AppState>) -> Json<ResetResponse> {
    let mut session = state.session.lock().await;
    session.reset();
    state.publish(&session);
    Json(ResetResponse {
        session_id: session.id(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use intel_chat::{
        CompletionClient, CompletionReply, CompletionRequest, ConversationOrchestrator,
        EngineTool, LlmError,
    };
    use intel_core::config::IntelConfig;
    use intel_core::types::EngineRequest;
    use intel_engine::{EngineError, EvidenceSource, RateLimiter};

    struct Echo;

    #[async_trait]
    impl CompletionClient for Echo {
        fn model(&self) -> &str {
            "echo"
        }

        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> Result<CompletionReply, LlmError> {
            Ok(CompletionReply::Text("echo".to_string()))
        }
    }

    struct NoBackend;

    #[async_trait]
    impl EvidenceSource for NoBackend {
        async fn run(&self, _request: &EngineRequest) -> Result<serde_json::Value, EngineError> {
            Err(EngineError::Transport("no backend in tests".to_string()))
        }
    }

    fn make_state() -> AppState {
        let tool = EngineTool::new(Arc::new(NoBackend), RateLimiter::disabled());
        let orchestrator = ConversationOrchestrator::new(Arc::new(Echo), tool);
        AppState::new(IntelConfig::default(), orchestrator)
    }

    fn make_app() -> axum::Router {
        crate::create_router(make_state())
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let resp = make_app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
        let health: HealthResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.message_count, 0);
        assert!(!health.has_evidence);
    }

    #[tokio::test]
    async fn test_read_endpoints_do_not_wait_for_a_turn() {
        let state = make_state();
        let app = crate::create_router(state.clone());
        // Stands in for a turn parked on the rate limiter or the backend.
        let _turn = state.session.lock().await;

        for uri in ["/health", "/history"] {
            let resp = tokio::time::timeout(
                std::time::Duration::from_secs(2),
                app.clone()
                    .oneshot(Request::get(uri).body(Body::empty()).unwrap()),
            )
            .await
            .expect("read endpoint queued behind the session lock")
            .unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn test_ui_serves_html() {
        let resp = make_app()
            .oneshot(Request::get("/ui").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let content_type = resp.headers().get("content-type").unwrap().to_str().unwrap();
        assert!(content_type.starts_with("text/html"));
    }

    #[tokio::test]
    async fn test_evidence_table_rejects_unknown_format() {
        let resp = make_app()
            .oneshot(
                Request::get("/evidence/table?format=pdf")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}

//! Router setup with all API routes and middleware.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use intel_core::config::IntelConfig;
use intel_core::IntelError;

use crate::handlers;
use crate::state::AppState;

/// Chat bodies are capped well above the message length limit.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // Only the page this server hosts may call it from a browser.
    let port = state.config.server.port;
    let origins: Vec<HeaderValue> = [
        format!("http://127.0.0.1:{}", port),
        format!("http://localhost:{}", port),
    ]
    .iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/ui", get(handlers::ui))
        .route("/chat", post(handlers::chat))
        .route("/history", get(handlers::history))
        .route("/evidence", get(handlers::evidence))
        .route("/evidence/table", get(handlers::evidence_table))
        .route("/session/reset", post(handlers::reset_session))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on `127.0.0.1:<port>`.
pub async fn start_server(config: &IntelConfig, state: AppState) -> Result<(), IntelError> {
    let addr = format!("127.0.0.1:{}", config.server.port);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| IntelError::Config(format!("failed to bind {}: {}", addr, e)))?;
    tracing::info!("Serving chat UI on http://{}/ui", addr);

    axum::serve(listener, router).await?;
    Ok(())
}

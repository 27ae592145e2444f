//! HTTP server implementation for the API

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{header, Method, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, error, info};
use uuid::Uuid;

use super::handlers;
use super::models::{status_for, ChatRequest, LoadVideoRequest, QuestionsRequest, TranscriptQuery};
use crate::config::Config;
use crate::service::ChatService;

/// Page served when `ui_dir` has no index.html
const EMBEDDED_UI: &str = include_str!("../../ui/index.html");

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ChatService>,
    pub config: Arc<Config>,
}

/// Routes, CORS and request tracing
pub fn build_router(app_state: AppState) -> Router {
    // Configure CORS to allow browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        // Health check endpoints (both paths for compatibility)
        .route("/health", get(health_handler))
        .route("/api/health", get(health_handler))
        // Sessions
        .route("/api/sessions", post(create_session_handler))
        .route("/api/sessions/:id", get(get_session_handler).delete(delete_session_handler))
        .route("/api/sessions/:id/video", post(load_video_handler))
        .route("/api/sessions/:id/chat", post(chat_handler))
        .route("/api/sessions/:id/summary", post(summary_handler))
        .route("/api/sessions/:id/questions", post(questions_handler))
        // Stateless transcript lookup
        .route("/api/transcript", get(transcript_handler))
        .route("/", get(serve_ui))
        .with_state(app_state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}

/// Configure and start the HTTP server
pub async fn start_http_server(app_state: AppState) -> Result<()> {
    let address = format!("{}:{}", app_state.config.server.host, app_state.config.server.port);
    let app = build_router(app_state);

    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("🌐 Chat UI listening on http://{}", address);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Map a handler result to JSON, errors as `{"error": ...}`
fn respond(result: crate::error::Result<Value>) -> Response {
    match result {
        Ok(data) => (StatusCode::OK, Json(data)).into_response(),
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                error!("Request failed ({}): {}", status, e);
            } else {
                debug!("Request rejected ({}): {}", status, e);
            }
            (status, Json(serde_json::json!({"error": e.to_string()}))).into_response()
        }
    }
}

/// Health check handler
async fn health_handler(State(state): State<AppState>) -> Response {
    respond(handlers::health_check(&state.service).await)
}

async fn create_session_handler(State(state): State<AppState>) -> Response {
    respond(handlers::create_session(&state.service).await)
}

async fn get_session_handler(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    respond(handlers::get_session(&state.service, id).await)
}

async fn delete_session_handler(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    respond(handlers::delete_session(&state.service, id).await)
}

async fn load_video_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<LoadVideoRequest>,
) -> Response {
    respond(handlers::load_video(&state.service, id, &payload).await)
}

async fn chat_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChatRequest>,
) -> Response {
    respond(handlers::chat(&state.service, id, &payload).await)
}

async fn summary_handler(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    respond(handlers::summary(&state.service, id).await)
}

async fn questions_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Option<Json<QuestionsRequest>>,
) -> Response {
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    respond(handlers::questions(&state.service, id, &request).await)
}

async fn transcript_handler(State(state): State<AppState>, Query(query): Query<TranscriptQuery>) -> Response {
    respond(handlers::transcript(&state.service, &query).await)
}

/// Serve the main UI page
async fn serve_ui(State(state): State<AppState>) -> impl IntoResponse {
    let path = state.config.server.ui_dir.join("index.html");

    match tokio::fs::read_to_string(&path).await {
        Ok(content) => Html(content),
        Err(_) => {
            debug!("No UI at {}, serving embedded page", path.display());
            Html(EMBEDDED_UI.to_string())
        }
    }
}

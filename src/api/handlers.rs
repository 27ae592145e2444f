//! API request handlers

use serde_json::Value;
use uuid::Uuid;

use super::models::{
    ChatRequest, LoadVideoRequest, LoadVideoResponse, QuestionsRequest, TranscriptQuery, DEFAULT_QUESTION_COUNT,
};
use crate::error::Result;
use crate::service::ChatService;
use crate::transcript::join_segments;

/// Handle health check requests
pub async fn health_check(service: &ChatService) -> Result<Value> {
    let (provider, llm_available) = service.llm_status().await;

    Ok(serde_json::json!({
        "status": "healthy",
        "service": "yt-transcript-chat",
        "version": env!("CARGO_PKG_VERSION"),
        "active_sessions": service.sessions().len().await,
        "llm": { "provider": provider, "available": llm_available },
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

pub async fn create_session(service: &ChatService) -> Result<Value> {
    let session_id = service.create_session().await;
    Ok(serde_json::json!({ "session_id": session_id }))
}

/// Loaded video and conversation for a session
pub async fn get_session(service: &ChatService, session_id: Uuid) -> Result<Value> {
    let session = service.session(session_id).await?;

    let video = session.video.as_ref().map(|video| LoadVideoResponse::new(session_id, video));

    Ok(serde_json::json!({
        "session_id": session.id,
        "created_at": session.created_at.to_rfc3339(),
        "video": video,
        "state": session.chat.state(),
        "history": session.chat.turns(),
    }))
}

pub async fn delete_session(service: &ChatService, session_id: Uuid) -> Result<Value> {
    service.end_session(session_id).await?;
    Ok(serde_json::json!({ "session_id": session_id, "removed": true }))
}

pub async fn load_video(service: &ChatService, session_id: Uuid, request: &LoadVideoRequest) -> Result<Value> {
    let video = service.load_video(session_id, &request.url).await?;
    Ok(serde_json::json!(LoadVideoResponse::new(session_id, &video)))
}

/// One chat round trip; the reply plus the full history for re-rendering
pub async fn chat(service: &ChatService, session_id: Uuid, request: &ChatRequest) -> Result<Value> {
    let update = service.chat(session_id, &request.message).await?;
    let session = service.session(session_id).await?;

    Ok(serde_json::json!({
        "reply": update.reply,
        "failed": update.failed,
        "history_len": update.history_len,
        "history": session.chat.turns(),
    }))
}

pub async fn summary(service: &ChatService, session_id: Uuid) -> Result<Value> {
    let summary = service.summarize(session_id).await?;
    Ok(serde_json::json!({ "summary": summary }))
}

pub async fn questions(service: &ChatService, session_id: Uuid, request: &QuestionsRequest) -> Result<Value> {
    let count = request.count.unwrap_or(DEFAULT_QUESTION_COUNT);
    let questions = service.generate_questions(session_id, count).await?;
    Ok(serde_json::json!({ "count": count, "questions": questions }))
}

/// Timed segments for a URL outside any session
pub async fn transcript(service: &ChatService, query: &TranscriptQuery) -> Result<Value> {
    let languages = query.languages();
    let segments = service.transcript_segments(&query.url, &languages).await?;

    Ok(serde_json::json!({
        "url": query.url,
        "segment_count": segments.len(),
        "text": join_segments(&segments),
        "segments": segments,
    }))
}

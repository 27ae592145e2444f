//! In-memory UI sessions
//!
//! Each session owns the currently loaded video and its conversation. Nothing
//! is persisted and sessions never see each other.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chat::ChatSession;
use crate::error::{AppError, Result};
use crate::transcript::RetrievalOutcome;
use crate::video_id::VideoId;

/// The video a session is currently talking about
#[derive(Debug, Clone, Serialize)]
pub struct LoadedVideo {
    pub id: VideoId,
    pub title: String,
    pub url: String,
    pub outcome: RetrievalOutcome,
}

/// State for one browser tab
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Last time the session was mutated; idle sessions are swept
    pub last_seen: DateTime<Utc>,
    pub video: Option<LoadedVideo>,
    pub chat: ChatSession,
}

impl Session {
    fn new(id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            last_seen: now,
            video: None,
            chat: ChatSession::new(),
        }
    }

    /// Replace the loaded video; history belongs to a transcript, so it is cleared
    pub fn load_video(&mut self, video: LoadedVideo) {
        if !self.chat.is_empty() {
            debug!("Clearing {} turns from session {}", self.chat.len(), self.id);
        }
        self.chat = ChatSession::new();
        self.video = Some(video);
    }

    /// Transcript text, if the loaded video has one
    pub fn transcript(&self) -> Option<&str> {
        self.video.as_ref().and_then(|video| video.outcome.text())
    }
}

/// Session registry shared by the HTTP handlers
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions.write().await.insert(id, Session::new(id));
        info!("🆕 Session created: {}", id);
        id
    }

    /// Snapshot of a session
    pub async fn get(&self, id: Uuid) -> Result<Session> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::SessionNotFound(id.to_string()))
    }

    /// Run `f` with exclusive access to one session.
    ///
    /// `f` is synchronous so the lock can never be held across a network call.
    pub async fn with_session_mut<F, R>(&self, id: Uuid, f: F) -> Result<R>
    where
        F: FnOnce(&mut Session) -> R,
    {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&id)
            .ok_or_else(|| AppError::SessionNotFound(id.to_string()))?;
        session.last_seen = Utc::now();
        Ok(f(session))
    }

    /// Answer a reply that will never arrive, without awaiting.
    ///
    /// Safe to call from `Drop`. If the lock is contended the update is
    /// handed to a spawned task instead.
    pub fn abandon_pending_reply(&self, id: Uuid) {
        if let Ok(mut sessions) = self.sessions.try_write() {
            if let Some(session) = sessions.get_mut(&id) {
                if session.chat.abandon_pending() {
                    warn!("⚠️ Reply for session {} abandoned", id);
                }
            }
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let store = self.clone();
                handle.spawn(async move {
                    let _ = store
                        .with_session_mut(id, |session| session.chat.abandon_pending())
                        .await;
                });
            }
            Err(_) => warn!("No runtime to release pending reply for session {}", id),
        }
    }

    /// Drop sessions that have not been touched for longer than `max_idle`
    pub async fn expire_idle(&self, max_idle: Duration) -> usize {
        let cutoff = Utc::now() - max_idle;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.last_seen >= cutoff);

        let expired = before - sessions.len();
        if expired > 0 {
            info!("🧹 Expired {} idle sessions ({} left)", expired, sessions.len());
        }
        expired
    }

    /// Tear a session down, dropping its history
    pub async fn remove(&self, id: Uuid) -> Result<()> {
        match self.sessions.write().await.remove(&id) {
            Some(session) => {
                info!("🗑️ Session {} removed ({} turns dropped)", id, session.chat.len());
                Ok(())
            }
            None => Err(AppError::SessionNotFound(id.to_string())),
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(text: &str) -> LoadedVideo {
        LoadedVideo {
            id: VideoId::resolve("dQw4w9WgXcQ").unwrap(),
            title: "Test".to_string(),
            url: "https://youtu.be/dQw4w9WgXcQ".to_string(),
            outcome: RetrievalOutcome::Success(text.to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_get_remove() {
        let store = SessionStore::new();
        let id = store.create().await;

        let session = store.get(id).await.unwrap();
        assert_eq!(session.id, id);
        assert!(session.video.is_none());
        assert!(session.chat.is_empty());

        store.remove(id).await.unwrap();
        assert!(store.is_empty().await);
        assert!(matches!(store.get(id).await, Err(AppError::SessionNotFound(_))));
        assert!(store.remove(id).await.is_err());
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = SessionStore::new();
        let first = store.create().await;
        let second = store.create().await;

        store
            .with_session_mut(first, |session| session.load_video(video("first transcript")))
            .await
            .unwrap();

        assert_eq!(store.get(first).await.unwrap().transcript(), Some("first transcript"));
        assert_eq!(store.get(second).await.unwrap().transcript(), None);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_failed_outcome_has_no_transcript() {
        let store = SessionStore::new();
        let id = store.create().await;

        store
            .with_session_mut(id, |session| {
                session.load_video(LoadedVideo {
                    outcome: RetrievalOutcome::Disabled,
                    ..video("")
                })
            })
            .await
            .unwrap();

        assert_eq!(store.get(id).await.unwrap().transcript(), None);
    }

    #[tokio::test]
    async fn test_unknown_session_is_rejected() {
        let store = SessionStore::new();
        let result = store.with_session_mut(Uuid::new_v4(), |_| ()).await;
        assert!(matches!(result, Err(AppError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn test_idle_sessions_expire() {
        let store = SessionStore::new();
        let stale = store.create().await;
        let fresh = store.create().await;

        store
            .with_session_mut(stale, |session| session.last_seen = Utc::now() - Duration::hours(3))
            .await
            .unwrap();

        assert_eq!(store.expire_idle(Duration::hours(2)).await, 1);
        assert!(matches!(store.get(stale).await, Err(AppError::SessionNotFound(_))));
        assert!(store.get(fresh).await.is_ok());
        assert_eq!(store.expire_idle(Duration::hours(2)).await, 0);
    }

    #[tokio::test]
    async fn test_abandon_pending_reply_frees_session() {
        let store = SessionStore::new();
        let id = store.create().await;
        store
            .with_session_mut(id, |session| {
                session.load_video(video("t"));
                crate::chat::ChatOrchestrator::new(std::sync::Arc::new(NeverLLM))
                    .begin(&mut session.chat, "t", "hello")
                    .unwrap();
            })
            .await
            .unwrap();

        store.abandon_pending_reply(id);

        let session = store.get(id).await.unwrap();
        assert_eq!(session.chat.state(), crate::chat::ChatState::Idle);
        assert_eq!(session.chat.len(), 2);

        // Unknown ids are ignored
        store.abandon_pending_reply(Uuid::new_v4());
    }

    struct NeverLLM;

    #[async_trait::async_trait]
    impl crate::llm::LLM for NeverLLM {
        async fn chat(
            &self,
            _messages: Vec<crate::llm::ChatMessage>,
            _options: crate::llm::ChatOptions,
        ) -> Result<crate::llm::LLMResponse> {
            Err(AppError::LlmCallFailure("unused".to_string()))
        }

        async fn is_available(&self) -> bool {
            false
        }

        fn provider_type(&self) -> crate::llm::LLMProvider {
            crate::llm::LLMProvider::LMStudio
        }
    }
}

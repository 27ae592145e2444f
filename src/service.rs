//! Session-level operations behind the HTTP API
//!
//! The session lock is only taken for synchronous bookkeeping; transcript,
//! title and LLM calls always run with the lock released.

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::chat::{ChatOrchestrator, ChatState, ChatUpdate};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::llm::analysis::TranscriptAnalyzer;
use crate::llm::{create_llm, LLMProvider, LLM};
use crate::session::{LoadedVideo, Session, SessionStore};
use crate::title::TitleResolver;
use crate::transcript::{TranscriptFetcher, TranscriptSegment, YouTubeTranscriptSource};
use crate::video_id::VideoId;

pub struct ChatService {
    sessions: SessionStore,
    fetcher: TranscriptFetcher,
    titles: TitleResolver,
    orchestrator: ChatOrchestrator,
    analyzer: TranscriptAnalyzer,
    llm: Arc<dyn LLM>,
}

/// Answers the pending turn if a chat future is dropped mid-flight
struct PendingReplyGuard<'a> {
    sessions: &'a SessionStore,
    session_id: Uuid,
    armed: bool,
}

impl Drop for PendingReplyGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.sessions.abandon_pending_reply(self.session_id);
        }
    }
}

impl ChatService {
    pub fn new(fetcher: TranscriptFetcher, titles: TitleResolver, llm: Arc<dyn LLM>) -> Self {
        Self {
            sessions: SessionStore::new(),
            fetcher,
            titles,
            orchestrator: ChatOrchestrator::new(llm.clone()),
            analyzer: TranscriptAnalyzer::new(llm.clone()),
            llm,
        }
    }

    /// Wire the production transcript source, title strategies and LLM provider
    pub fn from_config(config: &Config) -> Result<Self> {
        let source = Arc::new(YouTubeTranscriptSource::new(&config.transcript)?);
        let fetcher = TranscriptFetcher::new(source, config.transcript.preferred_languages.clone());
        let titles = TitleResolver::new(&config.title)?;
        let llm: Arc<dyn LLM> = Arc::from(create_llm(&config.llm)?);

        info!("🤖 Using {:?} model {}", llm.provider_type(), config.llm.model);
        Ok(Self::new(fetcher, titles, llm))
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Provider in use and whether it answers right now
    pub async fn llm_status(&self) -> (LLMProvider, bool) {
        (self.llm.provider_type(), self.llm.is_available().await)
    }

    pub async fn create_session(&self) -> Uuid {
        self.sessions.create().await
    }

    pub async fn session(&self, session_id: Uuid) -> Result<Session> {
        self.sessions.get(session_id).await
    }

    pub async fn end_session(&self, session_id: Uuid) -> Result<()> {
        self.sessions.remove(session_id).await
    }

    /// Resolve a URL, look up title and transcript concurrently and make it the
    /// session's current video. Retrieval failures are part of the returned
    /// outcome; only an unparseable URL is an error.
    pub async fn load_video(&self, session_id: Uuid, url: &str) -> Result<LoadedVideo> {
        // Fail fast before any network traffic
        self.sessions.get(session_id).await?;
        let video_id = VideoId::resolve(url)?;

        info!("🎬 Loading video {} for session {}", video_id, session_id);
        let (title, outcome) = tokio::join!(
            self.titles.resolve_id(&video_id),
            self.fetcher.fetch_preferred(&video_id)
        );

        if !outcome.is_success() {
            warn!("No usable transcript for {}: {}", video_id, outcome.display_message());
        }

        let video = LoadedVideo {
            id: video_id,
            title,
            url: url.trim().to_string(),
            outcome,
        };

        let loaded = video.clone();
        self.sessions
            .with_session_mut(session_id, move |session| {
                if session.chat.state() == ChatState::AwaitingReply {
                    return Err(AppError::ChatBusy);
                }
                session.load_video(loaded);
                Ok(())
            })
            .await??;

        Ok(video)
    }

    /// One chat round trip. LLM failures come back as an apology turn.
    ///
    /// If the caller goes away before the reply lands (client disconnect,
    /// aborted task), the pending turn is closed with an apology so the
    /// session does not stay busy.
    pub async fn chat(&self, session_id: Uuid, message: &str) -> Result<ChatUpdate> {
        let pending = self
            .sessions
            .with_session_mut(session_id, |session| {
                let transcript = session
                    .transcript()
                    .map(str::to_string)
                    .ok_or(AppError::NoTranscriptLoaded)?;
                self.orchestrator.begin(&mut session.chat, &transcript, message)
            })
            .await??;

        let mut guard = PendingReplyGuard {
            sessions: &self.sessions,
            session_id,
            armed: true,
        };

        let reply = self.orchestrator.request_reply(&pending).await;

        let update = self
            .sessions
            .with_session_mut(session_id, |session| self.orchestrator.finish(&mut session.chat, reply))
            .await;
        guard.armed = false;
        let update = update?;

        info!("💬 Session {} now has {} turns", session_id, update.history_len);
        Ok(update)
    }

    pub async fn summarize(&self, session_id: Uuid) -> Result<String> {
        let transcript = self.loaded_transcript(session_id).await?;
        self.analyzer.summarize(&transcript).await
    }

    pub async fn generate_questions(&self, session_id: Uuid, count: usize) -> Result<String> {
        let transcript = self.loaded_transcript(session_id).await?;
        self.analyzer.generate_questions(&transcript, count).await
    }

    /// Timed segments for a URL, raising typed errors
    pub async fn transcript_segments(&self, url: &str, languages: &[String]) -> Result<Vec<TranscriptSegment>> {
        let video_id = VideoId::resolve(url)?;
        self.fetcher.fetch_segments(&video_id, languages).await
    }

    async fn loaded_transcript(&self, session_id: Uuid) -> Result<String> {
        self.sessions
            .get(session_id)
            .await?
            .transcript()
            .map(str::to_string)
            .ok_or(AppError::NoTranscriptLoaded)
    }
}

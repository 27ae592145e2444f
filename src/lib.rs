//! YouTube Transcript Chat
//!
//! Load the transcript of a YouTube video and talk about it with an LLM.

pub mod api;
pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
pub mod prompt;
pub mod service;
pub mod session;
pub mod title;
pub mod transcript;
pub mod video_id;

// Re-export main types for easy access
pub use crate::chat::{ChatOrchestrator, ChatSession, ChatUpdate, ConversationTurn, Role};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{AppError, Result};
pub use crate::llm::analysis::TranscriptAnalyzer;
pub use crate::llm::{LLMConfig, LLMProvider, LLM};
pub use crate::service::ChatService;
pub use crate::session::{LoadedVideo, Session, SessionStore};
pub use crate::title::{TitleResolver, TitleStrategy};
pub use crate::transcript::{
    RetrievalOutcome, TranscriptFetcher, TranscriptSegment, TranscriptSource, YouTubeTranscriptSource,
};
pub use crate::video_id::VideoId;

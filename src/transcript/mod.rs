//! Transcript retrieval
//!
//! [`TranscriptFetcher`] applies the retrieval policy on top of a
//! [`TranscriptSource`]: preferred languages first, then the first transcript
//! the provider lists (translated to the first preferred language when
//! possible, untranslated otherwise). Every path reduces to a
//! [`RetrievalOutcome`].

pub mod parser;
pub mod youtube;

pub use youtube::YouTubeTranscriptSource;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::video_id::VideoId;

pub const NO_TRANSCRIPT_MESSAGE: &str = "No transcript available for this video.";
pub const NO_CAPTIONS_MESSAGE: &str =
    "No transcript available for this video. The creator may not have added captions.";
pub const DISABLED_MESSAGE: &str = "Transcripts are disabled for this video.";
pub const UNAVAILABLE_MESSAGE: &str = "This video is unavailable.";

/// Provider error text that means an empty or malformed caption response
const EMPTY_RESPONSE_MARKER: &str = "no element found";

/// One caption unit with timing in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    pub start: f64,
    pub duration: f64,
}

/// A transcript the provider offers for a video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptHandle {
    pub language_code: String,
    pub language: String,
    pub is_generated: bool,
    pub is_translatable: bool,
    pub base_url: String,
}

/// Caption provider contract
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// Segments in the first of `languages` the video has.
    ///
    /// Fails with `NoTranscriptFound` when none of them exist.
    async fn fetch(&self, video_id: &VideoId, languages: &[String]) -> Result<Vec<TranscriptSegment>>;

    /// Every transcript available for the video, in provider order
    async fn list(&self, video_id: &VideoId) -> Result<Vec<TranscriptHandle>>;

    /// Segments of one listed transcript, machine-translated when `translate_to` is set
    async fn fetch_handle(
        &self,
        video_id: &VideoId,
        handle: &TranscriptHandle,
        translate_to: Option<&str>,
    ) -> Result<Vec<TranscriptSegment>>;
}

/// Closed set of results a transcript fetch reduces to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum RetrievalOutcome {
    Success(String),
    Unavailable,
    Disabled,
    NotFound(String),
    UnknownError(String),
}

impl RetrievalOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RetrievalOutcome::Success(_))
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            RetrievalOutcome::Success(text) => Some(text),
            _ => None,
        }
    }

    /// Transcript text on success, otherwise the message shown to the user
    pub fn display_message(&self) -> &str {
        match self {
            RetrievalOutcome::Success(text) => text,
            RetrievalOutcome::Unavailable => UNAVAILABLE_MESSAGE,
            RetrievalOutcome::Disabled => DISABLED_MESSAGE,
            RetrievalOutcome::NotFound(message) | RetrievalOutcome::UnknownError(message) => message,
        }
    }

    /// Raising shape for programmatic callers
    pub fn into_result(self, video_id: &VideoId, languages: &[String]) -> Result<String> {
        match self {
            RetrievalOutcome::Success(text) => Ok(text),
            RetrievalOutcome::Unavailable => Err(AppError::VideoUnavailable(video_id.to_string())),
            RetrievalOutcome::Disabled => Err(AppError::TranscriptsDisabled(video_id.to_string())),
            RetrievalOutcome::NotFound(_) => Err(AppError::NoTranscriptFound {
                video_id: video_id.to_string(),
                languages: languages.to_vec(),
            }),
            RetrievalOutcome::UnknownError(message) => Err(AppError::UnknownRetrieval(message)),
        }
    }

    fn from_error(error: AppError) -> Self {
        match error {
            AppError::VideoUnavailable(_) => RetrievalOutcome::Unavailable,
            AppError::TranscriptsDisabled(_) => RetrievalOutcome::Disabled,
            AppError::NoTranscriptFound { .. } => RetrievalOutcome::NotFound(NO_TRANSCRIPT_MESSAGE.to_string()),
            other => {
                let message = other.to_string();
                if message.contains(EMPTY_RESPONSE_MARKER) {
                    RetrievalOutcome::UnknownError(NO_CAPTIONS_MESSAGE.to_string())
                } else {
                    RetrievalOutcome::UnknownError(format!("Error fetching transcript: {}", message))
                }
            }
        }
    }
}

/// Join segment texts with single spaces, keeping segment order
pub fn join_segments(segments: &[TranscriptSegment]) -> String {
    segments
        .iter()
        .map(|segment| segment.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Applies the retrieval policy over a transcript source
#[derive(Clone)]
pub struct TranscriptFetcher {
    source: Arc<dyn TranscriptSource>,
    preferred_languages: Vec<String>,
}

impl TranscriptFetcher {
    pub fn new(source: Arc<dyn TranscriptSource>, preferred_languages: Vec<String>) -> Self {
        Self {
            source,
            preferred_languages,
        }
    }

    pub fn preferred_languages(&self) -> &[String] {
        &self.preferred_languages
    }

    /// Fetch with the configured language preferences
    pub async fn fetch_preferred(&self, video_id: &VideoId) -> RetrievalOutcome {
        self.fetch(video_id, &self.preferred_languages).await
    }

    /// Fetch the transcript text, reduced to a [`RetrievalOutcome`]
    pub async fn fetch(&self, video_id: &VideoId, languages: &[String]) -> RetrievalOutcome {
        match self.fetch_text(video_id, languages).await {
            Ok(Some(text)) => {
                info!("📝 Transcript loaded for {} ({} chars)", video_id, text.len());
                RetrievalOutcome::Success(text)
            }
            Ok(None) => {
                info!("No transcript listed for {}", video_id);
                RetrievalOutcome::NotFound(NO_TRANSCRIPT_MESSAGE.to_string())
            }
            Err(e) => {
                warn!("Transcript retrieval failed for {}: {}", video_id, e);
                RetrievalOutcome::from_error(e)
            }
        }
    }

    /// Fetch the transcript text or raise the typed failure
    pub async fn fetch_text_or_error(&self, video_id: &VideoId, languages: &[String]) -> Result<String> {
        self.fetch(video_id, languages).await.into_result(video_id, languages)
    }

    /// Timed segments in the requested languages, without the fallback chain
    pub async fn fetch_segments(&self, video_id: &VideoId, languages: &[String]) -> Result<Vec<TranscriptSegment>> {
        let languages = if languages.is_empty() {
            &self.preferred_languages
        } else {
            languages
        };

        match self.source.fetch(video_id, languages).await {
            Ok(segments) => Ok(segments),
            Err(AppError::NoTranscriptFound { video_id, .. }) => Err(AppError::NoTranscriptFound {
                video_id,
                languages: languages.to_vec(),
            }),
            Err(e) => Err(e),
        }
    }

    async fn fetch_text(&self, video_id: &VideoId, languages: &[String]) -> Result<Option<String>> {
        match self.source.fetch(video_id, languages).await {
            Ok(segments) => return Ok(Some(join_segments(&segments))),
            Err(AppError::NoTranscriptFound { .. }) => {
                debug!("No transcript in {:?} for {}, trying any language", languages, video_id);
            }
            Err(e) => return Err(e),
        }

        let handles = self.source.list(video_id).await?;
        let Some(handle) = handles.into_iter().next() else {
            return Ok(None);
        };

        let segments = match languages.first() {
            Some(target) => match self.source.fetch_handle(video_id, &handle, Some(target)).await {
                Ok(segments) => {
                    info!("🌐 Translated {} transcript to {}", handle.language_code, target);
                    segments
                }
                Err(e @ (AppError::VideoUnavailable(_) | AppError::TranscriptsDisabled(_))) => return Err(e),
                Err(e) => {
                    warn!(
                        "Translation of {} transcript to {} failed, using original: {}",
                        handle.language_code, target, e
                    );
                    self.source.fetch_handle(video_id, &handle, None).await?
                }
            },
            None => self.source.fetch_handle(video_id, &handle, None).await?,
        };

        Ok(Some(join_segments(&segments)))
    }
}

//! API data models

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::session::LoadedVideo;

pub const DEFAULT_QUESTION_COUNT: usize = 5;

/// Shown next to a failed transcript load
pub const TRANSCRIPT_SUGGESTION: &str = "💡 Try a different YouTube video that has captions or transcripts available. \
Popular videos, educational content, and videos from major channels are more likely to have transcripts.";

/// Videos known to carry transcripts
#[derive(Debug, Clone, Serialize)]
pub struct ExampleVideo {
    pub title: &'static str,
    pub url: &'static str,
}

pub const EXAMPLE_VIDEOS: [ExampleVideo; 3] = [
    ExampleVideo {
        title: "TED Talk: The danger of AI is weirder than you think",
        url: "https://www.youtube.com/watch?v=OhCzX0iLnOc",
    },
    ExampleVideo {
        title: "Khan Academy: Introduction to the atom",
        url: "https://www.youtube.com/watch?v=1xSQlwWGT8M",
    },
    ExampleVideo {
        title: "NASA: Overview of the James Webb Space Telescope",
        url: "https://www.youtube.com/watch?v=4P8fKd0IVOs",
    },
];

#[derive(Debug, Deserialize)]
pub struct LoadVideoRequest {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct QuestionsRequest {
    pub count: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct TranscriptQuery {
    pub url: String,
    /// Comma separated language codes, preferred first
    pub lang: Option<String>,
}

impl TranscriptQuery {
    pub fn languages(&self) -> Vec<String> {
        self.lang
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(|lang| lang.trim().to_string())
            .filter(|lang| !lang.is_empty())
            .collect()
    }
}

/// Result of loading a video into a session
#[derive(Debug, Serialize)]
pub struct LoadVideoResponse {
    pub session_id: Uuid,
    pub video_id: String,
    pub title: String,
    pub url: String,
    pub transcript_available: bool,
    /// Full transcript text on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_chars: Option<usize>,
    /// User-facing failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<ExampleVideo>,
}

impl LoadVideoResponse {
    pub fn new(session_id: Uuid, video: &LoadedVideo) -> Self {
        let available = video.outcome.is_success();

        Self {
            session_id,
            video_id: video.id.to_string(),
            title: video.title.clone(),
            url: video.url.clone(),
            transcript_available: available,
            transcript: video.outcome.text().map(str::to_string),
            transcript_chars: video.outcome.text().map(|text| text.chars().count()),
            message: (!available).then(|| video.outcome.display_message().to_string()),
            suggestion: (!available).then_some(TRANSCRIPT_SUGGESTION),
            examples: if available { Vec::new() } else { EXAMPLE_VIDEOS.to_vec() },
        }
    }
}

/// HTTP status for a library error
pub fn status_for(error: &AppError) -> StatusCode {
    match error {
        AppError::InvalidUrl(_) | AppError::EmptyMessage => StatusCode::BAD_REQUEST,
        AppError::SessionNotFound(_) | AppError::NoTranscriptFound { .. } => StatusCode::NOT_FOUND,
        AppError::ChatBusy | AppError::NoTranscriptLoaded => StatusCode::CONFLICT,
        AppError::VideoUnavailable(_) | AppError::TranscriptsDisabled(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AppError::UnknownRetrieval(_) | AppError::LlmCallFailure(_) | AppError::Http(_) => StatusCode::BAD_GATEWAY,
        AppError::TitleUnresolvable(_) | AppError::MissingApiKey | AppError::Config(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

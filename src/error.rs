use thiserror::Error;

/// Errors surfaced by the transcript chat library
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid YouTube URL: {0}")]
    InvalidUrl(String),

    #[error("Video '{0}' is unavailable.")]
    VideoUnavailable(String),

    #[error("Transcripts are disabled for video '{0}'.")]
    TranscriptsDisabled(String),

    #[error("No transcripts found for video '{video_id}' in languages {languages:?}.")]
    NoTranscriptFound {
        video_id: String,
        languages: Vec<String>,
    },

    #[error("{0}")]
    UnknownRetrieval(String),

    #[error("Could not resolve a title for video '{0}'")]
    TitleUnresolvable(String),

    #[error("LLM call failed: {0}")]
    LlmCallFailure(String),

    #[error("Missing API key: set OPENAI_API_KEY in secrets.toml or the environment")]
    MissingApiKey,

    #[error("Session {0} not found")]
    SessionNotFound(String),

    #[error("A reply is already being generated for this session")]
    ChatBusy,

    #[error("No transcript is loaded for this session")]
    NoTranscriptLoaded,

    #[error("Message must not be empty")]
    EmptyMessage,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

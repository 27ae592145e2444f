use async_trait::async_trait;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use yt_transcript_chat::llm::create_llm;
use yt_transcript_chat::transcript::TranscriptHandle;
use yt_transcript_chat::{
    AppError, ChatService, LLMConfig, LLMProvider, Result, RetrievalOutcome, Role, TitleResolver,
    TranscriptFetcher, TranscriptSegment, TranscriptSource, VideoId, LLM,
};

/// English captions for every video except the German-only one
struct FakeYouTube;

const GERMAN_ONLY: &str = "deOnlyVid01";

fn segments(texts: &[&str]) -> Vec<TranscriptSegment> {
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| TranscriptSegment {
            text: text.to_string(),
            start: i as f64 * 2.0,
            duration: 2.0,
        })
        .collect()
}

#[async_trait]
impl TranscriptSource for FakeYouTube {
    async fn fetch(&self, video_id: &VideoId, languages: &[String]) -> Result<Vec<TranscriptSegment>> {
        if video_id.as_str() == GERMAN_ONLY || !languages.iter().any(|lang| lang == "en") {
            return Err(AppError::NoTranscriptFound {
                video_id: video_id.to_string(),
                languages: languages.to_vec(),
            });
        }
        Ok(segments(&["Hello", "world"]))
    }

    async fn list(&self, _video_id: &VideoId) -> Result<Vec<TranscriptHandle>> {
        Ok(vec![TranscriptHandle {
            language_code: "de".to_string(),
            language: "German".to_string(),
            is_generated: false,
            is_translatable: true,
            base_url: "https://captions.test/de".to_string(),
        }])
    }

    async fn fetch_handle(
        &self,
        _video_id: &VideoId,
        _handle: &TranscriptHandle,
        translate_to: Option<&str>,
    ) -> Result<Vec<TranscriptSegment>> {
        match translate_to {
            Some("en") => Ok(segments(&["Good", "morning"])),
            _ => Ok(segments(&["Guten", "Morgen"])),
        }
    }
}

async fn mock_llm(server: &MockServer, status: u16, answer: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(status).set_body_json(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": answer}}],
            "usage": {"total_tokens": 42}
        })))
        .mount(server)
        .await;
}

fn service_with_llm(server: &MockServer) -> ChatService {
    let config = LLMConfig {
        provider: LLMProvider::LMStudio,
        endpoint: Some(format!("{}/v1/chat/completions", server.uri())),
        ..LLMConfig::default()
    };
    let llm: Arc<dyn LLM> = Arc::from(create_llm(&config).unwrap());
    let fetcher = TranscriptFetcher::new(Arc::new(FakeYouTube), vec!["en".to_string()]);

    ChatService::new(fetcher, TitleResolver::with_strategies(Vec::new()), llm)
}

async fn sent_prompts(server: &MockServer) -> Vec<serde_json::Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| serde_json::from_slice(&request.body).unwrap())
        .collect()
}

#[tokio::test]
async fn test_short_link_end_to_end() {
    let server = MockServer::start().await;
    mock_llm(&server, 200, "It is a greeting.").await;
    let service = service_with_llm(&server);
    let session_id = service.create_session().await;

    let video = service.load_video(session_id, "https://youtu.be/abc123XYZ9").await.unwrap();
    assert_eq!(video.id.as_str(), "abc123XYZ9");
    assert_eq!(video.title, "YouTube Video (ID: abc123XYZ9)");
    assert_eq!(video.outcome, RetrievalOutcome::Success("Hello world".to_string()));

    let update = service.chat(session_id, "Summarize").await.unwrap();
    assert!(!update.failed);
    assert_eq!(update.history_len, 2);

    let session = service.session(session_id).await.unwrap();
    let turns = session.chat.turns();
    assert_eq!(turns[0].role, Role::User);
    assert_eq!(turns[0].content, "Summarize");
    assert_eq!(turns[1].role, Role::Assistant);
    assert_eq!(turns[1].content, "It is a greeting.");

    let requests = sent_prompts(&server).await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["model"], "gpt-3.5-turbo");
    assert_eq!(requests[0]["max_tokens"], 800);
    assert!(requests[0].get("temperature").is_some());
    let prompt = requests[0]["messages"][1]["content"].as_str().unwrap();
    assert!(prompt.contains("Here's the transcript:\n\nHello world\n\n"));
    assert!(prompt.ends_with("Previous conversation:\n\n\nUser: Summarize\n\nAssistant:"));
}

#[tokio::test]
async fn test_history_grows_by_two_per_round_trip() {
    let server = MockServer::start().await;
    mock_llm(&server, 200, "Same answer").await;
    let service = service_with_llm(&server);
    let session_id = service.create_session().await;
    service.load_video(session_id, "dQw4w9WgXcQ").await.unwrap();

    let first = service.chat(session_id, "What is this?").await.unwrap();
    let second = service.chat(session_id, "What is this?").await.unwrap();
    assert_eq!(first.history_len, 2);
    assert_eq!(second.history_len, 4);

    // The second prompt replays the first exchange
    let requests = sent_prompts(&server).await;
    let prompt = requests[1]["messages"][1]["content"].as_str().unwrap();
    assert!(prompt.contains("Previous conversation:\nUser: What is this?\n\nAssistant: Same answer\n\n"));
}

#[tokio::test]
async fn test_llm_failure_becomes_apology_turn() {
    let server = MockServer::start().await;
    mock_llm(&server, 500, "unused").await;
    let service = service_with_llm(&server);
    let session_id = service.create_session().await;
    service.load_video(session_id, "dQw4w9WgXcQ").await.unwrap();

    let update = service.chat(session_id, "Hello?").await.unwrap();
    assert!(update.failed);
    assert_eq!(update.history_len, 2);
    assert!(update.reply.content.starts_with("I'm sorry, I encountered an error: "));

    // The session is usable again afterwards
    assert!(service.chat(session_id, "Still there?").await.is_ok());
}

#[tokio::test]
async fn test_preferred_language_miss_falls_back_to_translation() {
    let server = MockServer::start().await;
    let service = service_with_llm(&server);
    let session_id = service.create_session().await;

    let video = service
        .load_video(session_id, &format!("https://www.youtube.com/watch?v={}", GERMAN_ONLY))
        .await
        .unwrap();
    assert_eq!(video.outcome.text(), Some("Good morning"));
}

#[tokio::test]
async fn test_segments_endpoint_semantics() {
    let server = MockServer::start().await;
    let service = service_with_llm(&server);

    let timed = service
        .transcript_segments("https://www.youtube.com/embed/dQw4w9WgXcQ", &["en".to_string()])
        .await
        .unwrap();
    assert_eq!(timed.len(), 2);
    assert_eq!(timed[1].start, 2.0);

    let missing = service
        .transcript_segments("https://youtu.be/dQw4w9WgXcQ", &["fr".to_string()])
        .await;
    assert!(matches!(missing, Err(AppError::NoTranscriptFound { .. })));
}

#[tokio::test]
async fn test_questions_and_summary_use_recovered_prompts() {
    let server = MockServer::start().await;
    mock_llm(&server, 200, "1. Why?").await;
    let service = service_with_llm(&server);
    let session_id = service.create_session().await;
    service.load_video(session_id, "dQw4w9WgXcQ").await.unwrap();

    assert_eq!(service.generate_questions(session_id, 3).await.unwrap(), "1. Why?");
    service.summarize(session_id).await.unwrap();

    let requests = sent_prompts(&server).await;
    assert_eq!(requests[0]["max_tokens"], 500);
    // Question generation leaves temperature to the provider
    assert!(requests[0].get("temperature").is_none());
    assert!(requests[1].get("temperature").is_some());
    assert!(requests[0]["messages"][1]["content"]
        .as_str()
        .unwrap()
        .contains("generate 3 thoughtful questions"));
    assert_eq!(
        requests[1]["messages"][1]["content"],
        "Summarize the following YouTube transcript:\n\nHello world"
    );

    // Asking about the video did not add chat turns
    assert!(service.session(session_id).await.unwrap().chat.is_empty());
}

#[tokio::test]
async fn test_title_resolution_never_empty() {
    let resolver = TitleResolver::with_strategies(Vec::new());
    assert_eq!(
        resolver.resolve_title("https://www.youtube.com/watch?v=dQw4w9WgXcQ").await,
        "YouTube Video (ID: dQw4w9WgXcQ)"
    );
    assert_eq!(resolver.resolve_title("???").await, "Unknown YouTube Video");
}

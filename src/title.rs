//! Video title lookup
//!
//! Titles are cosmetic, so [`TitleResolver::resolve_title`] never fails:
//! strategies run in order until one yields a non-empty title, and a
//! placeholder is returned when they all fail.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{header, Client, Method, Request, Url};
use scraper::Html;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::TitleConfig;
use crate::error::{AppError, Result};
use crate::video_id::VideoId;

pub const UNKNOWN_VIDEO_TITLE: &str = "Unknown YouTube Video";

static HTML_TITLE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<title>(.*?) - YouTube</title>").expect("valid title regex"));

// Escaped characters (\" included) stay inside the capture
static JSON_TITLE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""title":"((?:[^"\\]|\\.)*)""#).expect("valid json title regex"));

/// Placeholder used when every strategy failed
pub fn placeholder_title(video_id: &VideoId) -> String {
    format!("YouTube Video (ID: {})", video_id)
}

/// One way of looking up a title
#[async_trait]
pub trait TitleStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn title(&self, video_id: &VideoId) -> Result<String>;
}

/// Pull a title out of a watch page: `<title>` first, then embedded JSON
pub fn extract_title(html: &str) -> Option<String> {
    if let Some(raw) = HTML_TITLE_PATTERN.captures(html).and_then(|c| c.get(1)) {
        let title = decode_entities(raw.as_str());
        if !title.is_empty() {
            return Some(title);
        }
    }

    let raw = JSON_TITLE_PATTERN.captures(html).and_then(|c| c.get(1))?;
    let unescaped = serde_json::from_str::<String>(&format!("\"{}\"", raw.as_str()))
        .unwrap_or_else(|_| raw.as_str().to_string());
    let title = decode_entities(&unescaped);

    (!title.is_empty()).then_some(title)
}

fn decode_entities(raw: &str) -> String {
    let text: String = if raw.contains('&') {
        Html::parse_fragment(raw).root_element().text().collect()
    } else {
        raw.to_string()
    };
    text.trim().to_string()
}

#[derive(Debug, Deserialize)]
struct OEmbedResponse {
    title: Option<String>,
}

/// Structured metadata lookup (oEmbed) with fixed-backoff retries
pub struct MetadataClientStrategy {
    client: Client,
    endpoint: String,
    attempts: u32,
    backoff: Duration,
}

impl MetadataClientStrategy {
    pub fn new(config: &TitleConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Config(format!("failed to build metadata client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.oembed_endpoint.clone(),
            attempts: config.metadata_attempts.max(1),
            backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }

    async fn lookup_once(&self, video_id: &VideoId) -> Result<String> {
        let url = format!(
            "{}?url={}&format=json",
            self.endpoint,
            urlencoding::encode(&video_id.watch_url())
        );

        let response = self.client.get(&url).send().await?.error_for_status()?;
        let body: OEmbedResponse = response.json().await?;

        body.title
            .map(|title| title.trim().to_string())
            .filter(|title| !title.is_empty())
            .ok_or_else(|| AppError::TitleUnresolvable(video_id.to_string()))
    }
}

#[async_trait]
impl TitleStrategy for MetadataClientStrategy {
    fn name(&self) -> &'static str {
        "metadata"
    }

    async fn title(&self, video_id: &VideoId) -> Result<String> {
        let mut last_error = AppError::TitleUnresolvable(video_id.to_string());

        for attempt in 1..=self.attempts {
            match self.lookup_once(video_id).await {
                Ok(title) => return Ok(title),
                Err(e) => {
                    debug!("Metadata lookup attempt {}/{} for {} failed: {}", attempt, self.attempts, video_id, e);
                    last_error = e;
                    if attempt < self.attempts {
                        tokio::time::sleep(self.backoff).await;
                    }
                }
            }
        }

        Err(last_error)
    }
}

/// Watch page GET through the shared pooled client
pub struct WatchPageStrategy {
    client: Client,
    base_url: String,
}

impl WatchPageStrategy {
    pub fn new(config: &TitleConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| AppError::Config(format!("failed to build watch page client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.watch_base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl TitleStrategy for WatchPageStrategy {
    fn name(&self) -> &'static str {
        "watch_page"
    }

    async fn title(&self, video_id: &VideoId) -> Result<String> {
        let url = format!("{}/watch?v={}", self.base_url, video_id);
        let html = self.client.get(&url).send().await?.error_for_status()?.text().await?;

        extract_title(&html).ok_or_else(|| AppError::TitleUnresolvable(video_id.to_string()))
    }
}

/// Hand-built request on a dedicated HTTP/1.1 client without connection pooling
pub struct RawRequestStrategy {
    client: Client,
    base_url: String,
    user_agent: String,
}

impl RawRequestStrategy {
    pub fn new(config: &TitleConfig) -> Result<Self> {
        let client = Client::builder()
            .http1_only()
            .pool_max_idle_per_host(0)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Config(format!("failed to build raw HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.watch_base_url.trim_end_matches('/').to_string(),
            user_agent: config.user_agent.clone(),
        })
    }
}

#[async_trait]
impl TitleStrategy for RawRequestStrategy {
    fn name(&self) -> &'static str {
        "raw_request"
    }

    async fn title(&self, video_id: &VideoId) -> Result<String> {
        let url = Url::parse(&format!("{}/watch?v={}", self.base_url, video_id))
            .map_err(|e| AppError::TitleUnresolvable(format!("{}: {}", video_id, e)))?;

        let mut request = Request::new(Method::GET, url);
        let headers = request.headers_mut();
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_str(&self.user_agent)
                .map_err(|e| AppError::Config(format!("invalid user agent: {}", e)))?,
        );
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("text/html"));
        headers.insert(header::CONNECTION, header::HeaderValue::from_static("close"));

        let response = self.client.execute(request).await?.error_for_status()?;
        let html = response.text().await?;

        extract_title(&html).ok_or_else(|| AppError::TitleUnresolvable(video_id.to_string()))
    }
}

/// Ordered strategies combined by first success
pub struct TitleResolver {
    strategies: Vec<Box<dyn TitleStrategy>>,
}

impl TitleResolver {
    /// Metadata client, then pooled watch page GET, then the raw request
    pub fn new(config: &TitleConfig) -> Result<Self> {
        Ok(Self::with_strategies(vec![
            Box::new(MetadataClientStrategy::new(config)?),
            Box::new(WatchPageStrategy::new(config)?),
            Box::new(RawRequestStrategy::new(config)?),
        ]))
    }

    pub fn with_strategies(strategies: Vec<Box<dyn TitleStrategy>>) -> Self {
        Self { strategies }
    }

    /// First non-empty title any strategy produces
    pub async fn title_for(&self, video_id: &VideoId) -> Result<String> {
        for strategy in &self.strategies {
            match strategy.title(video_id).await {
                Ok(title) if !title.trim().is_empty() => {
                    info!("🏷️ Title for {} via {}: {}", video_id, strategy.name(), title);
                    return Ok(title);
                }
                Ok(_) => warn!("Title strategy {} returned an empty title for {}", strategy.name(), video_id),
                Err(e) => warn!("Title strategy {} failed for {}: {}", strategy.name(), video_id, e),
            }
        }

        Err(AppError::TitleUnresolvable(video_id.to_string()))
    }

    /// Title for an already resolved identifier, placeholder on failure
    pub async fn resolve_id(&self, video_id: &VideoId) -> String {
        match self.title_for(video_id).await {
            Ok(title) => title,
            Err(_) => placeholder_title(video_id),
        }
    }

    /// Title for an arbitrary URL; never fails and never returns an empty string
    pub async fn resolve_title(&self, url: &str) -> String {
        match VideoId::resolve(url) {
            Ok(video_id) => self.resolve_id(&video_id).await,
            Err(_) => UNKNOWN_VIDEO_TITLE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use wiremock::matchers::{header as header_matcher, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn id() -> VideoId {
        VideoId::resolve("dQw4w9WgXcQ").unwrap()
    }

    fn config_for(server: &MockServer) -> TitleConfig {
        TitleConfig {
            oembed_endpoint: format!("{}/oembed", server.uri()),
            watch_base_url: server.uri(),
            retry_backoff_ms: 0,
            user_agent: "yt-transcript-chat-test/1.0".to_string(),
            ..TitleConfig::default()
        }
    }

    struct Fixed {
        result: Option<&'static str>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TitleStrategy for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn title(&self, video_id: &VideoId) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result
                .map(str::to_string)
                .ok_or_else(|| AppError::TitleUnresolvable(video_id.to_string()))
        }
    }

    fn fixed(result: Option<&'static str>, calls: &Arc<AtomicUsize>) -> Box<dyn TitleStrategy> {
        Box::new(Fixed {
            result,
            calls: calls.clone(),
        })
    }

    #[test]
    fn test_extract_title_prefers_html_title() {
        let html = r#"<html><head><title>Rock &amp; Roll - YouTube</title></head>
            <script>{"title":"Other"}</script></html>"#;
        assert_eq!(extract_title(html).as_deref(), Some("Rock & Roll"));
    }

    #[test]
    fn test_extract_title_falls_back_to_json() {
        let html = r#"<title>YouTube</title><script>var x = {"title":"Café & more"};</script>"#;
        assert_eq!(extract_title(html).as_deref(), Some("Café & more"));
    }

    #[test]
    fn test_extract_json_title_with_escaped_quotes() {
        let html = r#"<script>{"title":"He said \"hi\" \u0026 left","lengthSeconds":"12"}</script>"#;
        assert_eq!(extract_title(html).as_deref(), Some(r#"He said "hi" & left"#));
    }

    #[test]
    fn test_extract_title_rejects_empty() {
        assert_eq!(extract_title("<title> - YouTube</title>"), None);
        assert_eq!(extract_title("<html></html>"), None);
    }

    #[tokio::test]
    async fn test_first_success_stops_the_chain() {
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = TitleResolver::with_strategies(vec![
            fixed(None, &calls),
            fixed(Some("  "), &calls),
            fixed(Some("Second Wins"), &calls),
            fixed(Some("Never Asked"), &calls),
        ]);

        assert_eq!(resolver.resolve_id(&id()).await, "Second Wins");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_placeholders_when_everything_fails() {
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = TitleResolver::with_strategies(vec![fixed(None, &calls)]);

        assert_eq!(
            resolver.resolve_title("https://www.youtube.com/watch?v=dQw4w9WgXcQ").await,
            "YouTube Video (ID: dQw4w9WgXcQ)"
        );
        assert_eq!(resolver.resolve_title("not a video").await, UNKNOWN_VIDEO_TITLE);
        assert!(matches!(
            resolver.title_for(&id()).await,
            Err(AppError::TitleUnresolvable(_))
        ));
    }

    #[tokio::test]
    async fn test_metadata_strategy_retries_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oembed"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/oembed"))
            .and(query_param("format", "json"))
            .and(query_param("url", "https://www.youtube.com/watch?v=dQw4w9WgXcQ"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "title": "Never Gonna Give You Up",
                "author_name": "Rick Astley"
            })))
            .mount(&server)
            .await;

        let strategy = MetadataClientStrategy::new(&config_for(&server)).unwrap();
        assert_eq!(strategy.title(&id()).await.unwrap(), "Never Gonna Give You Up");
    }

    #[tokio::test]
    async fn test_metadata_strategy_gives_up_after_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oembed"))
            .respond_with(ResponseTemplate::new(404))
            .expect(3)
            .mount(&server)
            .await;

        let strategy = MetadataClientStrategy::new(&config_for(&server)).unwrap();
        assert!(strategy.title(&id()).await.is_err());
    }

    #[tokio::test]
    async fn test_watch_page_strategies_send_user_agent() {
        let server = MockServer::start().await;
        let config = config_for(&server);
        Mock::given(method("GET"))
            .and(path("/watch"))
            .and(query_param("v", "dQw4w9WgXcQ"))
            .and(header_matcher("user-agent", config.user_agent.as_str()))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<title>Scraped Title - YouTube</title>"),
            )
            .mount(&server)
            .await;

        let pooled = WatchPageStrategy::new(&config).unwrap();
        assert_eq!(pooled.title(&id()).await.unwrap(), "Scraped Title");

        let raw = RawRequestStrategy::new(&config).unwrap();
        assert_eq!(raw.title(&id()).await.unwrap(), "Scraped Title");
    }

    #[tokio::test]
    async fn test_resolver_falls_through_to_watch_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oembed"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/watch"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"title":"From JSON"}"#))
            .mount(&server)
            .await;

        let resolver = TitleResolver::new(&config_for(&server)).unwrap();
        assert_eq!(resolver.resolve_id(&id()).await, "From JSON");
    }
}

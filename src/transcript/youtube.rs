//! Caption retrieval from YouTube via the InnerTube player endpoint
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{header, Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use super::parser::parse_timedtext;
use super::{TranscriptHandle, TranscriptSegment, TranscriptSource};
use crate::config::TranscriptConfig;
use crate::error::{AppError, Result};
use crate::video_id::VideoId;

static API_KEY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""INNERTUBE_API_KEY":\s*"([a-zA-Z0-9_-]+)""#).expect("valid api key regex"));

const INNERTUBE_CLIENT_NAME: &str = "ANDROID";
const INNERTUBE_CLIENT_VERSION: &str = "20.10.38";

/// [`TranscriptSource`] backed by the public watch page and player API
pub struct YouTubeTranscriptSource {
    client: Client,
    base_url: String,
}

impl YouTubeTranscriptSource {
    pub fn new(config: &TranscriptConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT_LANGUAGE, header::HeaderValue::from_static("en-US"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .build()
            .map_err(|e| AppError::Config(format!("failed to build transcript HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_text(&self, url: &str, video_id: &VideoId) -> Result<String> {
        let response = self.client.get(url).send().await?;
        check_status(response.status(), video_id)?;
        Ok(response.text().await?)
    }

    /// Watch page → API key → player response JSON
    async fn player_response(&self, video_id: &VideoId) -> Result<Value> {
        let watch_url = format!("{}/watch?v={}", self.base_url, video_id);
        let html = self.get_text(&watch_url, video_id).await?;

        if html.contains("action=\"https://consent.youtube.com/s\"") {
            return Err(AppError::UnknownRetrieval(format!(
                "YouTube asked for cookie consent while loading video '{}'",
                video_id
            )));
        }

        let api_key = extract_api_key(&html, video_id)?;
        debug!("Found InnerTube API key for {}", video_id);

        let player_url = format!("{}/youtubei/v1/player?key={}", self.base_url, api_key);
        let body = serde_json::json!({
            "context": {
                "client": {
                    "clientName": INNERTUBE_CLIENT_NAME,
                    "clientVersion": INNERTUBE_CLIENT_VERSION
                }
            },
            "videoId": video_id.as_str()
        });

        let response = self.client.post(&player_url).json(&body).send().await?;
        check_status(response.status(), video_id)?;

        response
            .json::<Value>()
            .await
            .map_err(|e| AppError::UnknownRetrieval(format!("invalid player response for '{}': {}", video_id, e)))
    }
}

#[async_trait]
impl TranscriptSource for YouTubeTranscriptSource {
    async fn fetch(&self, video_id: &VideoId, languages: &[String]) -> Result<Vec<TranscriptSegment>> {
        let handles = self.list(video_id).await?;

        // Manually created tracks win over generated ones for the same language
        let chosen = languages.iter().find_map(|lang| {
            handles
                .iter()
                .find(|h| !h.is_generated && &h.language_code == lang)
                .or_else(|| handles.iter().find(|h| h.is_generated && &h.language_code == lang))
        });

        match chosen {
            Some(handle) => self.fetch_handle(video_id, handle, None).await,
            None => Err(AppError::NoTranscriptFound {
                video_id: video_id.to_string(),
                languages: languages.to_vec(),
            }),
        }
    }

    async fn list(&self, video_id: &VideoId) -> Result<Vec<TranscriptHandle>> {
        let player = self.player_response(video_id).await?;
        assert_playability(&player, video_id)?;

        let handles = caption_tracks(&player, video_id)?;
        info!("📃 {} caption tracks available for {}", handles.len(), video_id);
        Ok(handles)
    }

    async fn fetch_handle(
        &self,
        video_id: &VideoId,
        handle: &TranscriptHandle,
        translate_to: Option<&str>,
    ) -> Result<Vec<TranscriptSegment>> {
        let mut url = handle.base_url.clone();

        if let Some(target) = translate_to {
            if !handle.is_translatable {
                return Err(AppError::UnknownRetrieval(format!(
                    "The {} transcript of '{}' cannot be translated",
                    handle.language_code, video_id
                )));
            }
            url = format!("{}&tlang={}", url, urlencoding::encode(target));
        }

        if url.contains("&exp=xpe") {
            return Err(AppError::UnknownRetrieval(format!(
                "Captions for '{}' require a proof-of-origin token",
                video_id
            )));
        }

        debug!("Fetching {} captions for {} (translate: {:?})", handle.language_code, video_id, translate_to);
        let xml = self.get_text(&url, video_id).await?;
        parse_timedtext(&xml)
    }
}

fn check_status(status: StatusCode, video_id: &VideoId) -> Result<()> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(AppError::UnknownRetrieval(format!(
            "YouTube is rate limiting requests (HTTP 429) for '{}'",
            video_id
        )));
    }
    if !status.is_success() {
        return Err(AppError::UnknownRetrieval(format!(
            "HTTP {}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown error")
        )));
    }
    Ok(())
}

fn extract_api_key(html: &str, video_id: &VideoId) -> Result<String> {
    if html.contains("class=\"g-recaptcha\"") {
        return Err(AppError::UnknownRetrieval(format!(
            "YouTube is blocking requests from this IP (captcha) for '{}'",
            video_id
        )));
    }

    API_KEY_PATTERN
        .captures(html)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| AppError::UnknownRetrieval(format!("Could not parse the watch page of '{}'", video_id)))
}

fn assert_playability(player: &Value, video_id: &VideoId) -> Result<()> {
    let Some(playability) = player.get("playabilityStatus") else {
        return Ok(());
    };

    let status = playability.get("status").and_then(Value::as_str).unwrap_or("OK");
    if status == "OK" {
        return Ok(());
    }

    let reason = playability.get("reason").and_then(Value::as_str).unwrap_or("");

    match status {
        "ERROR" if reason.to_lowercase().contains("unavailable") => {
            Err(AppError::VideoUnavailable(video_id.to_string()))
        }
        "LOGIN_REQUIRED" if reason.contains("not a bot") => Err(AppError::UnknownRetrieval(format!(
            "YouTube requires sign-in to confirm this is not a bot for '{}'",
            video_id
        ))),
        _ => Err(AppError::UnknownRetrieval(format!(
            "Video '{}' is not playable: {} {}",
            video_id, status, reason
        ))),
    }
}

/// Caption tracks in the order the player response lists them
fn caption_tracks(player: &Value, video_id: &VideoId) -> Result<Vec<TranscriptHandle>> {
    let tracks = player
        .pointer("/captions/playerCaptionsTracklistRenderer/captionTracks")
        .and_then(Value::as_array)
        .ok_or_else(|| AppError::TranscriptsDisabled(video_id.to_string()))?;

    let handles: Vec<TranscriptHandle> = tracks
        .iter()
        .filter_map(|track| {
            let language_code = track.get("languageCode")?.as_str()?.to_string();
            let base_url = track.get("baseUrl")?.as_str()?.replace("&fmt=srv3", "");

            let language = track
                .pointer("/name/runs/0/text")
                .or_else(|| track.pointer("/name/simpleText"))
                .and_then(Value::as_str)
                .unwrap_or(&language_code)
                .to_string();

            Some(TranscriptHandle {
                is_generated: track.get("kind").and_then(Value::as_str) == Some("asr"),
                is_translatable: track.get("isTranslatable").and_then(Value::as_bool).unwrap_or(false),
                language_code,
                language,
                base_url,
            })
        })
        .collect();

    if handles.is_empty() {
        return Err(AppError::TranscriptsDisabled(video_id.to_string()));
    }

    Ok(handles)
}

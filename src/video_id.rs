//! Video identifier parsing
//!
//! Accepts watch-page URLs, `youtu.be` short links, `/embed/` URLs and bare
//! 11-character identifiers. Pure string/URL parsing, no network access.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::error::{AppError, Result};

static EMBED_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/embed/([\w-]+)").expect("valid embed regex"));

static BARE_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("valid id regex"));

const SHORT_LINK_HOSTS: [&str; 2] = ["youtu.be", "www.youtu.be"];

/// Canonical YouTube video identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    /// Resolve an arbitrary user-supplied string into a video identifier
    pub fn resolve(input: &str) -> Result<Self> {
        let input = input.trim();

        if let Some(url) = parse_url(input) {
            if let Some(candidate) = extract_from_url(&url) {
                return Self::from_token(candidate, input);
            }
            // A watch URL without `v` is a hard failure, not a bare id
            if url.path() == "/watch" {
                return Err(AppError::InvalidUrl(input.to_string()));
            }
        }

        if BARE_ID_PATTERN.is_match(input) {
            return Ok(Self(input.to_string()));
        }

        Err(AppError::InvalidUrl(input.to_string()))
    }

    fn from_token(token: String, input: &str) -> Result<Self> {
        let valid = !token.is_empty()
            && token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

        if valid {
            Ok(Self(token))
        } else {
            Err(AppError::InvalidUrl(input.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical watch page URL for this video
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VideoId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Free-function form of [`VideoId::resolve`]
pub fn resolve(input: &str) -> Result<VideoId> {
    VideoId::resolve(input)
}

fn parse_url(input: &str) -> Option<Url> {
    if let Ok(url) = Url::parse(input) {
        if url.has_host() {
            return Some(url);
        }
    }

    // Users often paste links without a scheme
    if input.contains("youtube.com") || input.contains("youtu.be") {
        return Url::parse(&format!("https://{}", input)).ok();
    }

    None
}

fn extract_from_url(url: &Url) -> Option<String> {
    let host = url.host_str().unwrap_or_default();

    if SHORT_LINK_HOSTS.contains(&host) {
        return Some(url.path().trim_start_matches('/').to_string());
    }

    if url.path() == "/watch" {
        return url
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned());
    }

    EMBED_PATTERN
        .captures(url.path())
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_short_and_embed_agree() {
        let urls = [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=30s",
            "https://m.youtube.com/watch?feature=share&v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ?si=abc",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://www.youtube-nocookie.com/embed/dQw4w9WgXcQ?start=10",
            "youtube.com/watch?v=dQw4w9WgXcQ",
        ];

        for url in urls {
            assert_eq!(resolve(url).unwrap().as_str(), "dQw4w9WgXcQ", "{}", url);
        }
    }

    #[test]
    fn test_bare_identifier() {
        assert_eq!(resolve("_NuH3D4SN-c").unwrap().as_str(), "_NuH3D4SN-c");
        assert_eq!(resolve("  dQw4w9WgXcQ ").unwrap().as_str(), "dQw4w9WgXcQ");
    }

    #[test]
    fn test_short_link_keeps_token_as_is() {
        assert_eq!(resolve("https://youtu.be/abc123XYZ9").unwrap().as_str(), "abc123XYZ9");
    }

    #[test]
    fn test_invalid_inputs() {
        for input in [
            "",
            "not a url",
            "not-a-valid-id",
            "https://example.com/page",
            "https://www.youtube.com/watch?list=PL123",
            "https://youtu.be/",
            "https://youtu.be/bad%20id",
        ] {
            assert!(
                matches!(resolve(input), Err(AppError::InvalidUrl(_))),
                "expected failure for {:?}",
                input
            );
        }
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let id = resolve("https://youtu.be/dQw4w9WgXcQ").unwrap();
        assert_eq!(resolve(id.as_str()).unwrap(), id);
        assert_eq!(id.watch_url(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    }
}

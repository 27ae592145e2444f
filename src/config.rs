use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::llm::LLMConfig;

/// Secrets files checked for the API key, in order
pub const SECRETS_PATHS: [&str; 2] = ["secrets.toml", ".streamlit/secrets.toml"];
pub const API_KEY_NAME: &str = "OPENAI_API_KEY";

/// Configuration for the transcript chat server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chat model settings
    pub llm: LLMConfig,

    /// Caption retrieval settings
    pub transcript: TranscriptConfig,

    /// Title lookup settings
    pub title: TitleConfig,

    /// HTTP server settings
    pub server: ServerConfig,

    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptConfig {
    /// Languages tried in order before falling back to any transcript
    pub preferred_languages: Vec<String>,

    /// Base URL of the video site (watch page and player API)
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_seconds: u64,

    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleConfig {
    /// Attempts made by the metadata (oEmbed) strategy
    pub metadata_attempts: u32,

    /// Fixed pause between metadata attempts
    pub retry_backoff_ms: u64,

    pub oembed_endpoint: String,

    /// Base URL the watch page strategies scrape
    pub watch_base_url: String,

    pub user_agent: String,

    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Directory holding index.html; the embedded page is served when missing
    pub ui_dir: PathBuf,

    /// Sessions untouched for this long are dropped
    pub session_idle_minutes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

const DESKTOP_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            preferred_languages: vec!["en".to_string()],
            base_url: "https://www.youtube.com".to_string(),
            timeout_seconds: 30,
            user_agent: DESKTOP_USER_AGENT.to_string(),
        }
    }
}

impl Default for TitleConfig {
    fn default() -> Self {
        Self {
            metadata_attempts: 3,
            retry_backoff_ms: 500,
            oembed_endpoint: "https://www.youtube.com/oembed".to_string(),
            watch_base_url: "https://www.youtube.com".to_string(),
            user_agent: DESKTOP_USER_AGENT.to_string(),
            timeout_seconds: 10,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8501,
            ui_dir: PathBuf::from("ui"),
            session_idle_minutes: 60,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the first config file found, else defaults.
    /// Environment overrides are applied either way.
    pub fn load() -> Result<Self> {
        let config_paths = [
            "yt-transcript-chat.toml",
            "config/yt-transcript-chat.toml",
            "/etc/yt-transcript-chat/config.toml",
        ];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str::<Config>(&config_str) {
                    Ok(mut config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        config.apply_overrides(|name| std::env::var(name).ok());
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        Self::from_env()
    }

    /// Load an explicit config file (`--config`); a missing or broken file is an error
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        tracing::info!("📄 Loaded configuration from: {}", path.display());
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Defaults plus environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Apply `YTC_*` overrides from `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("YTC_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid YTC_PORT value: {}", port),
            }
        }

        if let Some(model) = lookup("YTC_MODEL") {
            self.llm.model = model;
        }

        if let Some(level) = lookup("YTC_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Some(languages) = lookup("YTC_LANGUAGES") {
            let languages: Vec<String> = languages
                .split(',')
                .map(|lang| lang.trim().to_string())
                .filter(|lang| !lang.is_empty())
                .collect();
            if !languages.is_empty() {
                self.transcript.preferred_languages = languages;
            }
        }
    }

    /// Fill `llm.api_key` from a secrets file, then the environment.
    /// A key already set in the config file wins.
    pub fn resolve_api_key(&mut self) {
        if self.llm.api_key.is_some() {
            return;
        }

        for path in SECRETS_PATHS {
            if let Some(key) = read_secret(Path::new(path), API_KEY_NAME) {
                tracing::info!("🔑 Using API key from {}", path);
                self.llm.api_key = Some(key);
                return;
            }
        }

        self.llm.api_key = std::env::var(API_KEY_NAME).ok().filter(|key| !key.trim().is_empty());
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.llm.requires_api_key() && self.llm.api_key.is_none() {
            return Err(anyhow!(
                "API key required for provider {:?}: set {} in secrets.toml or the environment",
                self.llm.provider,
                API_KEY_NAME
            ));
        }

        if !self.llm.requires_api_key() && self.llm.endpoint.is_none() {
            return Err(anyhow!("Endpoint required for provider {:?}", self.llm.provider));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(anyhow!("temperature must be between 0.0 and 2.0"));
        }

        if self.llm.max_tokens == 0 {
            return Err(anyhow!("max_tokens must be greater than 0"));
        }

        if self.transcript.preferred_languages.is_empty() {
            return Err(anyhow!("At least one preferred transcript language is required"));
        }

        if self.title.metadata_attempts == 0 {
            return Err(anyhow!("metadata_attempts must be greater than 0"));
        }

        if self.server.port == 0 {
            return Err(anyhow!("port must be greater than 0"));
        }

        if self.server.session_idle_minutes == 0 {
            return Err(anyhow!("session_idle_minutes must be greater than 0"));
        }

        tracing::info!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Transcript Chat Configuration:\n\
            - LLM Provider: {:?}\n\
            - Model: {} (max_tokens {}, temperature {})\n\
            - API Key: {}\n\
            - Transcript Languages: {}\n\
            - Title Attempts: {} ({}ms backoff)\n\
            - Listen Address: {}:{}\n\
            - Session Idle Expiry: {} min",
            self.llm.provider,
            self.llm.model,
            self.llm.max_tokens,
            self.llm.temperature,
            if self.llm.api_key.is_some() { "set" } else { "not set" },
            self.transcript.preferred_languages.join(", "),
            self.title.metadata_attempts,
            self.title.retry_backoff_ms,
            self.server.host,
            self.server.port,
            self.server.session_idle_minutes
        )
    }
}

/// Read one string key from a flat TOML secrets file
fn read_secret(path: &Path, key: &str) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<HashMap<String, toml::Value>>(&content) {
        Ok(secrets) => secrets
            .get(key)
            .and_then(|value| value.as_str())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty()),
        Err(e) => {
            tracing::warn!("Failed to parse secrets file {}: {}", path.display(), e);
            None
        }
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.llm.api_key = Some(api_key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.config.llm.model = model.into();
        self
    }

    pub fn with_llm_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.llm.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_languages(mut self, languages: Vec<String>) -> Self {
        self.config.transcript.preferred_languages = languages;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.config.server.host = host.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

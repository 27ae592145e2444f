use super::{ChatMessage, ChatOptions, LLMConfig, LLMProvider, LLMResponse, LLM, OPENAI_CHAT_ENDPOINT};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Availability checks back the health endpoint, so they must answer quickly
const AVAILABILITY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
    usage: Option<ChatCompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionUsage {
    total_tokens: u32,
}

fn build_client(config: &LLMConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .build()
        .map_err(|e| AppError::Config(format!("failed to build LLM HTTP client: {}", e)))
}

fn build_request(config: &LLMConfig, messages: Vec<ChatMessage>, options: ChatOptions) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: config.model.clone(),
        messages,
        max_tokens: options.max_tokens.unwrap_or(config.max_tokens),
        temperature: if options.provider_temperature {
            None
        } else {
            Some(options.temperature.unwrap_or(config.temperature))
        },
    }
}

/// Both providers list models next to the chat-completions route
async fn models_reachable(client: &reqwest::Client, chat_endpoint: &str, api_key: Option<&str>) -> bool {
    let models_endpoint = chat_endpoint.replace("/chat/completions", "/models");
    let mut builder = client.get(&models_endpoint).timeout(AVAILABILITY_TIMEOUT);
    if let Some(key) = api_key {
        builder = builder.header("Authorization", format!("Bearer {}", key));
    }

    match builder.send().await {
        Ok(response) => response.status().is_success(),
        Err(e) => {
            debug!("Model list at {} unreachable: {}", models_endpoint, e);
            false
        }
    }
}

/// POST a chat-completions request and pull out the first choice
async fn post_chat_completion(
    client: &reqwest::Client,
    endpoint: &str,
    api_key: Option<&str>,
    label: &str,
    request: &ChatCompletionRequest,
) -> Result<LLMResponse> {
    let mut builder = client.post(endpoint).json(request);
    if let Some(key) = api_key {
        builder = builder.header("Authorization", format!("Bearer {}", key));
    }

    let response = builder
        .send()
        .await
        .map_err(|e| AppError::LlmCallFailure(format!("{} request failed: {}", label, e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(AppError::LlmCallFailure(format!("{} API error {}: {}", label, status, text)));
    }

    let completion: ChatCompletionResponse = response
        .json()
        .await
        .map_err(|e| AppError::LlmCallFailure(format!("invalid {} response: {}", label, e)))?;

    let content = completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AppError::LlmCallFailure(format!("No response from {}", label)))?
        .message
        .content;

    Ok(LLMResponse {
        content,
        tokens_used: completion.usage.map(|u| u.total_tokens),
    })
}

/// OpenAI provider implementation
pub struct OpenAIProvider {
    config: LLMConfig,
    client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn new(config: LLMConfig) -> Result<Self> {
        if config.api_key.is_none() {
            return Err(AppError::MissingApiKey);
        }

        let client = build_client(&config)?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> &str {
        self.config.endpoint.as_deref().unwrap_or(OPENAI_CHAT_ENDPOINT)
    }
}

#[async_trait]
impl LLM for OpenAIProvider {
    async fn chat(&self, messages: Vec<ChatMessage>, options: ChatOptions) -> Result<LLMResponse> {
        let api_key = self.config.api_key.as_deref().ok_or(AppError::MissingApiKey)?;
        let request = build_request(&self.config, messages, options);

        debug!("Sending request to OpenAI API ({} messages)", request.messages.len());

        let response = post_chat_completion(&self.client, self.endpoint(), Some(api_key), "OpenAI", &request).await?;

        debug!("OpenAI completion received (tokens: {:?})", response.tokens_used);
        Ok(response)
    }

    async fn is_available(&self) -> bool {
        let Some(api_key) = &self.config.api_key else {
            return false;
        };
        models_reachable(&self.client, self.endpoint(), Some(api_key.as_str())).await
    }

    fn provider_type(&self) -> LLMProvider {
        LLMProvider::OpenAI
    }
}

/// LMStudio provider implementation (OpenAI-compatible local server)
pub struct LMStudioProvider {
    config: LLMConfig,
    client: reqwest::Client,
}

impl LMStudioProvider {
    pub fn new(config: LLMConfig) -> Result<Self> {
        if config.endpoint.is_none() {
            return Err(AppError::Config("LMStudio endpoint not configured".to_string()));
        }

        let client = build_client(&config)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl LLM for LMStudioProvider {
    async fn chat(&self, messages: Vec<ChatMessage>, options: ChatOptions) -> Result<LLMResponse> {
        let endpoint = self
            .config
            .endpoint
            .as_deref()
            .ok_or_else(|| AppError::Config("LMStudio endpoint not configured".to_string()))?;

        let request = build_request(&self.config, messages, options);

        debug!("Sending request to LMStudio at {}", endpoint);

        post_chat_completion(&self.client, endpoint, self.config.api_key.as_deref(), "LMStudio", &request).await
    }

    async fn is_available(&self) -> bool {
        match &self.config.endpoint {
            Some(endpoint) => models_reachable(&self.client, endpoint, None).await,
            None => false,
        }
    }

    fn provider_type(&self) -> LLMProvider {
        LLMProvider::LMStudio
    }
}

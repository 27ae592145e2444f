use super::{ChatMessage, ChatOptions, LLM};
use crate::error::Result;
use crate::prompt::{self, ANALYSIS_SYSTEM_PROMPT, DEFAULT_SUMMARY_INSTRUCTION, QUESTIONS_SYSTEM_PROMPT};
use std::sync::Arc;
use tracing::{debug, info};

/// Upper bound on generated questions per request
pub const MAX_QUESTIONS: usize = 20;

/// One-shot transcript analysis outside the chat loop
pub struct TranscriptAnalyzer {
    llm: Arc<dyn LLM>,
}

impl TranscriptAnalyzer {
    pub fn new(llm: Arc<dyn LLM>) -> Self {
        Self { llm }
    }

    /// Run an arbitrary instruction over the transcript
    pub async fn analyze(&self, transcript: &str, instruction: &str) -> Result<String> {
        debug!("Analyzing transcript ({} chars)", transcript.len());

        let messages = vec![
            ChatMessage::system(ANALYSIS_SYSTEM_PROMPT),
            ChatMessage::user(prompt::analysis_prompt(instruction, transcript)),
        ];

        let response = self.llm.chat(messages, ChatOptions::default()).await?;
        Ok(response.content)
    }

    pub async fn summarize(&self, transcript: &str) -> Result<String> {
        self.analyze(transcript, DEFAULT_SUMMARY_INSTRUCTION).await
    }

    /// Generate `count` questions about the transcript (clamped to 1..=MAX_QUESTIONS)
    pub async fn generate_questions(&self, transcript: &str, count: usize) -> Result<String> {
        let count = count.clamp(1, MAX_QUESTIONS);

        let messages = vec![
            ChatMessage::system(QUESTIONS_SYSTEM_PROMPT),
            ChatMessage::user(prompt::questions_prompt(transcript, count)),
        ];
        let options = ChatOptions {
            max_tokens: Some(500),
            provider_temperature: true,
            ..ChatOptions::default()
        };

        let response = self.llm.chat(messages, options).await?;
        info!("❓ Generated {} questions (tokens: {:?})", count, response.tokens_used);
        Ok(response.content)
    }
}

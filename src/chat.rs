//! Conversation log and the chat turn loop
//!
//! A [`ChatSession`] is an append-only log of turns owned by one UI session.
//! [`ChatOrchestrator`] drives one round trip: append the user turn, ask the
//! LLM, append the reply. LLM failures become an assistant turn carrying an
//! apology instead of an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::llm::{ChatMessage, ChatOptions, LLM};
use crate::prompt::{self, ANALYSIS_SYSTEM_PROMPT};

/// Author of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Label used when the turn is rendered into a prompt
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// One message in the user/assistant exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Where the conversation is in its turn loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatState {
    Idle,
    AwaitingReply,
}

/// Conversation log for a single UI session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    turns: Vec<ConversationTurn>,
    state: ChatState,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            turns: Vec::new(),
            state: ChatState::Idle,
        }
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn state(&self) -> ChatState {
        self.state
    }

    /// Close a round trip whose reply will never arrive.
    ///
    /// The user turn stays and is answered with an apology so the log keeps its
    /// user/assistant pairing. Returns false when nothing was pending.
    pub fn abandon_pending(&mut self) -> bool {
        if self.state != ChatState::AwaitingReply {
            return false;
        }
        self.push(Role::Assistant, apology(&AppError::LlmCallFailure(CANCELLED_REPLY.to_string())));
        self.state = ChatState::Idle;
        true
    }

    fn push(&mut self, role: Role, content: impl Into<String>) -> ConversationTurn {
        let turn = ConversationTurn::new(role, content);
        self.turns.push(turn.clone());
        turn
    }
}

const CANCELLED_REPLY: &str = "the request was cancelled before a reply arrived";

fn apology(error: &AppError) -> String {
    format!("I'm sorry, I encountered an error: {}", error)
}

/// A user turn that has been logged and is waiting for the model
#[derive(Debug, Clone)]
pub struct PendingReply {
    pub prompt: String,
}

/// Result of one round trip, returned to the UI as its re-render signal
#[derive(Debug, Clone, Serialize)]
pub struct ChatUpdate {
    pub reply: ConversationTurn,
    pub failed: bool,
    pub history_len: usize,
}

/// Runs the submit → reply loop against an LLM
pub struct ChatOrchestrator {
    llm: Arc<dyn LLM>,
}

impl ChatOrchestrator {
    pub fn new(llm: Arc<dyn LLM>) -> Self {
        Self { llm }
    }

    /// Log the user turn and build the prompt for it.
    ///
    /// The prompt is built from the turns that existed before this message.
    /// On error the session is left untouched.
    pub fn begin(&self, session: &mut ChatSession, transcript: &str, user_text: &str) -> Result<PendingReply> {
        let user_text = user_text.trim();
        if user_text.is_empty() {
            return Err(AppError::EmptyMessage);
        }
        if session.state == ChatState::AwaitingReply {
            return Err(AppError::ChatBusy);
        }

        let prompt = prompt::compose(transcript, &session.turns, user_text);
        session.push(Role::User, user_text);
        session.state = ChatState::AwaitingReply;

        debug!("Composed chat prompt ({} chars, {} prior turns)", prompt.len(), session.len() - 1);
        Ok(PendingReply { prompt })
    }

    /// Ask the model for the reply to a pending turn
    pub async fn request_reply(&self, pending: &PendingReply) -> Result<String> {
        let messages = vec![
            ChatMessage::system(ANALYSIS_SYSTEM_PROMPT),
            ChatMessage::user(pending.prompt.clone()),
        ];

        let response = self.llm.chat(messages, ChatOptions::default()).await?;
        Ok(response.content)
    }

    /// Append the reply (or an apology for the failure) and go back to idle
    pub fn finish(&self, session: &mut ChatSession, reply: Result<String>) -> ChatUpdate {
        let (content, failed) = match reply {
            Ok(content) => (content, false),
            Err(e) => {
                warn!("LLM call failed, logging apology turn: {}", e);
                (apology(&e), true)
            }
        };

        let reply = session.push(Role::Assistant, content);
        session.state = ChatState::Idle;

        ChatUpdate {
            reply,
            failed,
            history_len: session.len(),
        }
    }

    /// Full round trip on a session the caller owns exclusively
    pub async fn submit(&self, session: &mut ChatSession, transcript: &str, user_text: &str) -> Result<ChatUpdate> {
        let pending = self.begin(session, transcript, user_text)?;
        let reply = self.request_reply(&pending).await;
        let update = self.finish(session, reply);

        info!("💬 Chat round trip complete ({} turns)", update.history_len);
        Ok(update)
    }
}

//! Prompt construction for transcript chat and analysis
//!
//! Everything is sent in full on every turn: the whole transcript and the
//! whole conversation so far. Nothing is truncated.

use crate::chat::ConversationTurn;

/// System instruction for transcript chat and summaries
pub const ANALYSIS_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that analyzes YouTube video transcripts and answers questions about the content.";

/// System instruction for question generation
pub const QUESTIONS_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that generates insightful questions based on video content.";

/// Default instruction placed in front of a transcript for one-shot analysis
pub const DEFAULT_SUMMARY_INSTRUCTION: &str = "Summarize the following YouTube transcript:";

/// Build the single user message for a chat turn
pub fn compose(transcript: &str, prior_turns: &[ConversationTurn], new_message: &str) -> String {
    let context = format!(
        "The following is a conversation about a YouTube video transcript. Here's the transcript:\n\n{}\n\nAnswer questions about this content.",
        transcript
    );

    let history: String = prior_turns
        .iter()
        .map(|turn| format!("{}: {}\n\n", turn.role.label(), turn.content))
        .collect();

    format!(
        "{}\n\nPrevious conversation:\n{}\n\nUser: {}\n\nAssistant:",
        context, history, new_message
    )
}

/// Prompt for a one-shot analysis of the transcript
pub fn analysis_prompt(instruction: &str, transcript: &str) -> String {
    format!("{}\n\n{}", instruction, transcript)
}

/// Prompt asking for a fixed number of questions about the transcript
pub fn questions_prompt(transcript: &str, count: usize) -> String {
    format!(
        "Based on the following YouTube transcript, generate {} thoughtful questions about the content:\n\n{}",
        count, transcript
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{ConversationTurn, Role};

    #[test]
    fn test_compose_without_history() {
        let prompt = compose("Hello world", &[], "Summarize this");

        assert!(prompt.starts_with(
            "The following is a conversation about a YouTube video transcript. Here's the transcript:\n\nHello world\n\n"
        ));
        assert!(prompt.contains("Previous conversation:\n\n\nUser: Summarize this\n\nAssistant:"));
        assert!(prompt.ends_with("Assistant:"));
    }

    #[test]
    fn test_compose_renders_turns_in_order() {
        let turns = vec![
            ConversationTurn::new(Role::User, "What is it about?"),
            ConversationTurn::new(Role::Assistant, "Cats."),
        ];

        let prompt = compose("transcript", &turns, "And dogs?");
        let expected_tail =
            "Previous conversation:\nUser: What is it about?\n\nAssistant: Cats.\n\n\n\nUser: And dogs?\n\nAssistant:";

        assert!(prompt.ends_with(expected_tail), "{}", prompt);
    }

    #[test]
    fn test_compose_keeps_full_transcript() {
        let transcript = "word ".repeat(50_000);
        let prompt = compose(&transcript, &[], "q");
        assert!(prompt.contains(&transcript));
    }

    #[test]
    fn test_analysis_and_question_prompts() {
        assert_eq!(
            analysis_prompt(DEFAULT_SUMMARY_INSTRUCTION, "text"),
            "Summarize the following YouTube transcript:\n\ntext"
        );
        assert!(questions_prompt("text", 5).starts_with("Based on the following YouTube transcript, generate 5 thoughtful"));
    }
}

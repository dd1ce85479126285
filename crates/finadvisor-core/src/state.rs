//! UI-agnostic conversation types
//!
//! Shared between the chat transport and whatever front-end renders the
//! conversation. Messages are appended to a history and never edited.

use serde::{Deserialize, Serialize};

/// Opening line of every chat session
pub const ASSISTANT_GREETING: &str =
    "Hello! I'm your AI financial assistant. How can I help you today?";

/// A chat message in the AI conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Conversation history seeded with the assistant greeting
pub fn new_conversation() -> Vec<ChatMessage> {
    vec![ChatMessage::assistant(ASSISTANT_GREETING)]
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::user("hi")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
    }

    #[test]
    fn test_new_conversation_starts_with_greeting() {
        let history = new_conversation();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, ChatRole::Assistant);
        assert_eq!(history[0].content, ASSISTANT_GREETING);
    }
}

//! UI-agnostic conversation types
//!
//! These are the records held by the conversation store and written to disk.
//! The serialized shape (`id`, `title`, `messages`, `createdAt`) is the
//! on-disk format of the conversation file.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Title given to conversations created before any message is sent
pub const DEFAULT_TITLE: &str = "New Chat";

/// Longest title derived from a message, in characters
pub const TITLE_MAX_CHARS: usize = 50;

/// A chat message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
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

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// Opaque conversation identifier, milliseconds since the epoch at creation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn from_millis(millis: i64) -> Self {
        Self(millis.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value of a time-derived id, if it has one
    pub fn millis(&self) -> Option<i64> {
        self.0.parse().ok()
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub title: String,
    pub messages: Vec<ChatMessage>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(id: ConversationId, title: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            title: title.into(),
            messages: Vec::new(),
            created_at,
        }
    }

    pub fn has_default_title(&self) -> bool {
        self.title == DEFAULT_TITLE
    }

    /// Secondary line shown under the title in the conversation list
    pub fn preview(&self) -> &str {
        self.messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or("No messages yet")
    }
}

/// Derive a conversation title from message text.
///
/// Text longer than [`TITLE_MAX_CHARS`] characters is cut to that many
/// characters and suffixed with `...`; shorter text is used verbatim.
pub fn derive_title(text: &str) -> String {
    if text.chars().count() > TITLE_MAX_CHARS {
        let prefix: String = text.chars().take(TITLE_MAX_CHARS).collect();
        format!("{}...", prefix)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_title_short_text_is_verbatim() {
        assert_eq!(derive_title("hello"), "hello");
    }

    #[test]
    fn test_derive_title_exactly_fifty_chars() {
        let text = "a".repeat(50);
        assert_eq!(derive_title(&text), text);
    }

    #[test]
    fn test_derive_title_truncates_long_text() {
        let title = derive_title(&"x".repeat(60));
        assert_eq!(title.chars().count(), 53);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn test_derive_title_counts_chars_not_bytes() {
        let text = "é".repeat(51);
        let title = derive_title(&text);
        assert_eq!(title, format!("{}...", "é".repeat(50)));
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }

    #[test]
    fn test_conversation_uses_created_at_camel_case() {
        let json = r#"{
            "id": "1700000000000",
            "title": "New Chat",
            "messages": [{"role": "user", "content": "hello"}],
            "createdAt": "2023-11-14T22:13:20.000Z"
        }"#;
        let conversation: Conversation = serde_json::from_str(json).unwrap();
        assert_eq!(conversation.id.as_str(), "1700000000000");
        assert_eq!(conversation.id.millis(), Some(1_700_000_000_000));
        assert_eq!(conversation.messages, vec![ChatMessage::user("hello")]);
        assert!(conversation.has_default_title());

        let back = serde_json::to_value(&conversation).unwrap();
        assert!(back.get("createdAt").is_some());
    }

    #[test]
    fn test_preview_uses_last_message() {
        let mut conversation = Conversation::new(ConversationId::from_millis(1), DEFAULT_TITLE, Utc::now());
        assert_eq!(conversation.preview(), "No messages yet");

        conversation.messages.push(ChatMessage::user("question"));
        conversation.messages.push(ChatMessage::assistant("answer"));
        assert_eq!(conversation.preview(), "answer");
    }
}

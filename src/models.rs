//! Core data models used throughout the assistant.
//!
//! These types represent the turns, persisted log entries, and context
//! items that flow through the retrieval and chat pipeline.

use serde::{Deserialize, Serialize};

/// Speaker of a [`Turn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message of a conversation, with its cached embedding.
///
/// The embedding is computed once when the turn is created and travels
/// with it into the log, so retrieval never has to recompute it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            embedding: None,
        }
    }

    pub fn new(role: Role, content: impl Into<String>, embedding: Option<Vec<f32>>) -> Self {
        Self {
            role,
            content: content.into(),
            embedding,
        }
    }

    /// The cached embedding, if one was obtained and is non-empty.
    pub fn cached_embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref().filter(|e| !e.is_empty())
    }
}

/// One persisted exchange: a timestamp and the user/assistant turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub timestamp: String,
    pub conversation: Vec<Turn>,
}

/// A scored match between the query and a past user turn.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    pub content: String,
    pub response: String,
    pub similarity: f32,
}

/// A markdown snippet found by file mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSnippet {
    pub file_path: String,
    pub content: String,
}

/// One web-search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebResult {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub content: String,
}

/// A message as sent to the chat model. Embeddings never leave the process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl From<&Turn> for ChatMessage {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role,
            content: turn.content.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
        let role: Role = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(role, Role::User);
    }

    #[test]
    fn test_turn_missing_embedding_reads_as_none() {
        let turn: Turn = serde_json::from_str(r#"{"role":"user","content":"hi"}"#).unwrap();
        assert_eq!(turn.embedding, None);
        assert!(turn.cached_embedding().is_none());
    }

    #[test]
    fn test_empty_embedding_is_not_cached() {
        let turn = Turn::new(Role::User, "hi", Some(vec![]));
        assert!(turn.cached_embedding().is_none());
    }

    #[test]
    fn test_chat_message_drops_embedding() {
        let turn = Turn::new(Role::User, "hello", Some(vec![0.1, 0.2]));
        let msg = ChatMessage::from(&turn);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hello"}));
    }
}

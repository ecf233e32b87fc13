//! Short-term memory: the bounded window of recent turns.
//!
//! The session always starts with the system directive. User and
//! assistant turns are embedded as they arrive so the embedding can be
//! persisted with them at flush time.

use std::sync::Arc;

use crate::config::SessionConfig;
use crate::embedding::{embed_or_empty, EmbeddingProvider};
use crate::models::{ChatMessage, Role, Turn};

/// Smallest usable window: the system turn plus the newest turn.
pub const MIN_WINDOW_SIZE: usize = 2;

pub struct ConversationSession {
    turns: Vec<Turn>,
    system_prompt: String,
    window_size: usize,
    pin_system_turn: bool,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl ConversationSession {
    /// Windows smaller than [`MIN_WINDOW_SIZE`] are raised to it.
    pub fn new(config: &SessionConfig, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        let mut session = Self {
            turns: Vec::new(),
            system_prompt: config.system_prompt.clone(),
            window_size: config.window_size.max(MIN_WINDOW_SIZE),
            pin_system_turn: config.pin_system_turn,
            embedder,
        };
        session.reset();
        session
    }

    /// Ensure the system turn is present at the head. Idempotent.
    pub fn reset(&mut self) {
        if !self.turns.iter().any(|t| t.role == Role::System) {
            self.turns.insert(0, Turn::system(self.system_prompt.clone()));
        }
    }

    pub async fn append_user(&mut self, text: &str) {
        self.append(Role::User, text).await;
    }

    pub async fn append_assistant(&mut self, text: &str) {
        self.append(Role::Assistant, text).await;
    }

    async fn append(&mut self, role: Role, text: &str) {
        let embedding = embed_or_empty(self.embedder.as_ref(), text).await;
        let embedding = (!embedding.is_empty()).then_some(embedding);
        self.turns.push(Turn::new(role, text, embedding));
        self.trim();
    }

    /// Drop the oldest turns beyond the window.
    ///
    /// With pinning the system turn stays at index 0 and counts toward the
    /// window. Without it the window slides over every turn and the system
    /// turn comes back at the next flush.
    pub fn trim(&mut self) {
        let len = self.turns.len();
        if len <= self.window_size {
            return;
        }

        let pinned = self.pin_system_turn
            && self.turns.first().map(|t| t.role) == Some(Role::System);

        if pinned {
            let excess = len - self.window_size;
            self.turns.drain(1..1 + excess);
        } else {
            self.turns.drain(..len - self.window_size);
        }
    }

    /// Take the user/assistant turns for persistence and reset to the
    /// system turn. Does nothing with fewer than two turns.
    pub fn flush(&mut self) -> Vec<Turn> {
        if self.turns.len() < 2 {
            return Vec::new();
        }

        let turns = std::mem::take(&mut self.turns);
        let extracted = turns
            .into_iter()
            .filter(|t| matches!(t.role, Role::User | Role::Assistant))
            .collect();

        self.reset();
        extracted
    }

    /// Owned copy of the window in wire form.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.turns.iter().map(ChatMessage::from).collect()
    }

    /// Cached embedding of the newest turn, if it has one.
    pub fn last_embedding(&self) -> Option<&[f32]> {
        self.turns.last().and_then(Turn::cached_embedding)
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

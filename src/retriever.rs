//! Similarity recall over the persisted chat log.
//!
//! Every past user turn is scored against the new input by cosine
//! similarity. The best matches above the threshold are paired with the
//! reply that followed them and rendered as context lines. The log is
//! small (one user, one machine), so this is a linear scan with no index.

use std::sync::Arc;

use crate::chat_log::ChatLog;
use crate::config::RetrievalConfig;
use crate::embedding::{cosine_similarity, embed_or_empty, EmbeddingProvider};
use crate::models::{ConversationEntry, MatchCandidate, Role};

pub struct ContextRetriever {
    embedder: Arc<dyn EmbeddingProvider>,
    log: ChatLog,
    similarity_threshold: f32,
    max_results: usize,
}

impl ContextRetriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        log: ChatLog,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            log,
            similarity_threshold: config.similarity_threshold,
            max_results: config.max_results,
        }
    }

    /// Context lines for past exchanges similar to `user_input`, best first.
    ///
    /// Returns nothing when the input cannot be embedded.
    pub async fn find_relevant_context(&self, user_input: &str) -> Vec<String> {
        let query = embed_or_empty(self.embedder.as_ref(), user_input).await;
        self.find_relevant_context_with(&query).await
    }

    /// Same as [`find_relevant_context`](Self::find_relevant_context) for an
    /// input that is already embedded. An empty `query` yields nothing.
    pub async fn find_relevant_context_with(&self, query: &[f32]) -> Vec<String> {
        if query.is_empty() {
            return Vec::new();
        }

        let entries = self.log.load_all();
        self.rank_matches(query, &entries)
            .await
            .iter()
            .map(format_match)
            .collect()
    }

    /// Score every user turn in `entries` against `query`.
    ///
    /// Keeps matches strictly above the threshold, sorted by descending
    /// similarity (ties keep log order), capped at `max_results`.
    pub async fn rank_matches(
        &self,
        query: &[f32],
        entries: &[ConversationEntry],
    ) -> Vec<MatchCandidate> {
        let mut matches = Vec::new();

        for entry in entries {
            for (i, turn) in entry.conversation.iter().enumerate() {
                if turn.role != Role::User {
                    continue;
                }

                let computed;
                let embedding = match turn.cached_embedding() {
                    Some(e) => e,
                    None => {
                        computed = embed_or_empty(self.embedder.as_ref(), &turn.content).await;
                        if computed.is_empty() {
                            continue;
                        }
                        &computed[..]
                    }
                };

                let Some(similarity) = cosine_similarity(query, embedding) else {
                    tracing::debug!(
                        query_dims = query.len(),
                        turn_dims = embedding.len(),
                        "skipping unscorable turn"
                    );
                    continue;
                };

                if similarity <= self.similarity_threshold {
                    continue;
                }

                let response = entry.conversation[i + 1..]
                    .iter()
                    .find(|t| t.role == Role::Assistant)
                    .map(|t| t.content.clone())
                    .unwrap_or_default();

                matches.push(MatchCandidate {
                    content: turn.content.clone(),
                    response,
                    similarity,
                });
            }
        }

        // sort_by is stable, so equal scores stay in log order
        matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        matches.truncate(self.max_results);
        matches
    }
}

/// Render a match as a history context line.
pub fn format_match(m: &MatchCandidate) -> String {
    format!("- Previously: '{}' → Reply: '{}'", m.content, m.response)
}

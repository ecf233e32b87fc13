//! Chat orchestrator: drives one request/response cycle.
//!
//! ```text
//!  Idle ─▶ AwaitingEmbedding ─▶ RetrievingContext ─▶ AwaitingModelResponse ─▶ Persisting ─▶ Idle
//!          (user turn)          (files/history/web)   (chat model call)          (flush + append)
//! ```
//!
//! Exchanges are strictly sequential: [`ChatOrchestrator::send_message`]
//! takes `&mut self`, so a second message cannot start before the first
//! has been persisted. Remote failures never escape; the caller always
//! gets a reply or the apology text.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use crate::assembler::ContextAssembler;
use crate::chat_log::{now_timestamp, ChatLog};
use crate::config::Config;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::error::FileModeError;
use crate::files::FileHandler;
use crate::llm::{ChatModel, ChatOptions, OllamaChat};
use crate::models::{ChatMessage, ConversationEntry, FileSnippet, Role};
use crate::retriever::ContextRetriever;
use crate::session::ConversationSession;
use crate::web_search::WebSearchHandler;

/// Reply returned when the chat model cannot be reached or answers badly.
pub const APOLOGY: &str = "Sorry, something went wrong. Please try again.";

/// Warning returned when file mode is enabled before a folder is chosen.
pub const FOLDER_REQUIRED_WARNING: &str =
    "Please set the path to a local folder with markdown files.";

/// Where the orchestrator is within the current exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Idle,
    AwaitingEmbedding,
    RetrievingContext,
    AwaitingModelResponse,
    Persisting,
}

pub struct ChatOrchestrator {
    session: ConversationSession,
    log: ChatLog,
    retriever: ContextRetriever,
    chat_model: Arc<dyn ChatModel>,
    files: FileHandler,
    web: WebSearchHandler,
    file_mode_enabled: bool,
    temperature: f32,
    state: ExchangeState,
}

impl ChatOrchestrator {
    /// Build an orchestrator around the given model clients.
    ///
    /// Validates `config` and creates the chat log file if it does not
    /// exist yet.
    pub fn new(
        config: &Config,
        embedder: Arc<dyn EmbeddingProvider>,
        chat_model: Arc<dyn ChatModel>,
    ) -> Result<Self> {
        config.validate()?;
        let log = ChatLog::from_config(&config.log);
        log.ensure_exists()?;

        Ok(Self {
            session: ConversationSession::new(&config.session, embedder.clone()),
            retriever: ContextRetriever::new(embedder, log.clone(), &config.retrieval),
            log,
            chat_model,
            files: FileHandler::new(&config.files),
            web: WebSearchHandler::new(&config.web_search)?,
            file_mode_enabled: false,
            temperature: config.chat.temperature,
            state: ExchangeState::Idle,
        })
    }

    /// Build an orchestrator with the Ollama clients named in `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let embedder: Arc<dyn EmbeddingProvider> = Arc::from(create_provider(&config.embedding)?);
        let chat_model: Arc<dyn ChatModel> = Arc::new(OllamaChat::new(&config.chat)?);
        Self::new(config, embedder, chat_model)
    }

    /// Run one exchange and return the reply.
    ///
    /// Returns `None` only for empty or whitespace-only input, in which
    /// case nothing is touched.
    pub async fn send_message(&mut self, user_input: &str) -> Option<String> {
        if user_input.trim().is_empty() {
            return None;
        }

        self.set_state(ExchangeState::AwaitingEmbedding);
        self.session.append_user(user_input).await;

        self.set_state(ExchangeState::RetrievingContext);
        let messages = self.build_messages(user_input).await;

        self.set_state(ExchangeState::AwaitingModelResponse);
        let options = ChatOptions {
            temperature: self.temperature,
        };
        let reply = match self.chat_model.chat(&messages, options).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(model = self.chat_model.model_name(), error = %e, "chat request failed");
                self.set_state(ExchangeState::Idle);
                return Some(APOLOGY.to_string());
            }
        };

        self.session.append_assistant(&reply).await;

        self.set_state(ExchangeState::Persisting);
        self.persist();

        self.set_state(ExchangeState::Idle);
        Some(reply)
    }

    /// Outgoing messages: a copy of the session window with the merged
    /// context block inserted right after the system turn.
    async fn build_messages(&self, user_input: &str) -> Vec<ChatMessage> {
        let mut messages = self.session.messages();

        let file_context = if self.file_mode_enabled {
            self.file_context(user_input)
        } else {
            None
        };
        // The user turn was embedded on append; reuse it as the query.
        let query = self.session.last_embedding().unwrap_or_default();
        let history_context = self.retriever.find_relevant_context_with(query).await;
        let web_context = if self.web.is_enabled() {
            Some(self.web.perform_search(user_input).await)
        } else {
            None
        };

        let merged = ContextAssembler::assemble(
            file_context.as_deref(),
            &history_context,
            web_context.as_deref(),
        );

        if let Some(content) = merged {
            let at = usize::from(messages.first().map(|m| m.role) == Some(Role::System));
            messages.insert(
                at,
                ChatMessage {
                    role: Role::System,
                    content,
                },
            );
        }

        messages
    }

    fn file_context(&self, user_input: &str) -> Option<Vec<FileSnippet>> {
        match self.files.find_relevant_markdown_content(user_input) {
            Ok(snippets) => Some(snippets),
            Err(FileModeError::FolderNotSet) => None,
            Err(e) => {
                tracing::warn!(error = %e, "file-mode lookup failed");
                None
            }
        }
    }

    fn persist(&mut self) {
        let turns = self.session.flush();
        if turns.is_empty() {
            return;
        }

        let entry = ConversationEntry {
            timestamp: now_timestamp(),
            conversation: turns,
        };
        if self.log.append(&entry).is_ok() {
            tracing::debug!(turns = entry.conversation.len(), "exchange persisted");
        }
    }

    /// Switch file mode. Returns a warning to show the user when it is
    /// enabled without a folder.
    pub fn toggle_file_mode(&mut self, enabled: bool) -> Option<String> {
        self.file_mode_enabled = enabled;
        if enabled && self.files.local_folder().is_none() {
            return Some(FOLDER_REQUIRED_WARNING.to_string());
        }
        None
    }

    pub fn set_local_folder(&mut self, path: &Path) -> Result<(), FileModeError> {
        self.files.save_local_folder(path)
    }

    pub fn toggle_web_search(&mut self, enabled: bool) {
        self.web.toggle_enabled(enabled);
    }

    /// Persist whatever the session still holds. Call before exit.
    pub fn finalize(&mut self) {
        self.persist();
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    pub fn session(&self) -> &ConversationSession {
        &self.session
    }

    pub fn log(&self) -> &ChatLog {
        &self.log
    }

    pub fn file_mode_enabled(&self) -> bool {
        self.file_mode_enabled
    }

    pub fn web_search_enabled(&self) -> bool {
        self.web.is_enabled()
    }

    fn set_state(&mut self, next: ExchangeState) {
        tracing::debug!(from = ?self.state, to = ?next, "exchange state");
        self.state = next;
    }
}

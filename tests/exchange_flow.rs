//! End-to-end exchange tests with in-process model doubles.
//!
//! The embedding and chat model are replaced through the
//! `EmbeddingProvider` and `ChatModel` traits, so the whole
//! session → retrieval → assembly → model → persistence path runs
//! without a network.

use ai_assistant::chat_log::{now_timestamp, ChatLog};
use ai_assistant::config::Config;
use ai_assistant::embedding::EmbeddingProvider;
use ai_assistant::error::{ChatModelError, EmbeddingError};
use ai_assistant::llm::{ChatModel, ChatOptions};
use ai_assistant::models::{ChatMessage, ConversationEntry, Role, Turn};
use ai_assistant::orchestrator::{ChatOrchestrator, ExchangeState, APOLOGY};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ─── Doubles ────────────────────────────────────────────────────────

const AXES: [&str; 3] = ["weather", "cat", "rust"];

/// One axis per known keyword plus a small constant bias axis.
struct KeywordEmbedder;

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let lower = text.to_lowercase();
        let mut v: Vec<f32> = AXES
            .iter()
            .map(|k| if lower.contains(k) { 1.0 } else { 0.0 })
            .collect();
        v.push(0.1);
        Ok(v)
    }
}

/// Behaves like an embedding service that is down.
struct UnreachableEmbedder;

#[async_trait]
impl EmbeddingProvider for UnreachableEmbedder {
    fn model_name(&self) -> &str {
        "unreachable"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Status {
            status: 503,
            body: "service unavailable".to_string(),
        })
    }
}

/// Records every request and answers with a fixed reply.
struct ScriptedModel {
    reply: Option<String>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    fn answering(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn last_request(&self) -> Vec<ChatMessage> {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        _options: ChatOptions,
    ) -> Result<String, ChatModelError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        self.reply
            .clone()
            .ok_or_else(|| ChatModelError::InvalidResponse("no message field".to_string()))
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

fn test_config(tmp: &TempDir) -> Config {
    let mut config = Config::default();
    config.log.path = tmp.path().join("data").join("chat_log.jsonl");
    config.log.backup_path = tmp.path().join("data").join("chat_log_backup.txt");
    config.files.settings_path = tmp.path().join("settings.json");
    config
}

fn seed(log: &ChatLog, user: &str, reply: &str) {
    log.ensure_exists().unwrap();
    log.append(&ConversationEntry {
        timestamp: now_timestamp(),
        conversation: vec![
            Turn::new(Role::User, user, None),
            Turn::new(Role::Assistant, reply, None),
        ],
    })
    .unwrap();
}

fn orchestrator(
    tmp: &TempDir,
    embedder: Arc<dyn EmbeddingProvider>,
    model: Arc<ScriptedModel>,
) -> ChatOrchestrator {
    ChatOrchestrator::new(&test_config(tmp), embedder, model).unwrap()
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_similar_history_is_recalled_after_system_turn() {
    let tmp = TempDir::new().unwrap();
    let log = ChatLog::from_config(&test_config(&tmp).log);
    seed(&log, "What's the weather like?", "Sunny and warm.");
    seed(&log, "Tell me about rust", "A systems language.");

    let model = ScriptedModel::answering("Still sunny.");
    let mut orch = orchestrator(&tmp, Arc::new(KeywordEmbedder), model.clone());

    let reply = orch.send_message("How is the weather today?").await;
    assert_eq!(reply.as_deref(), Some("Still sunny."));

    let sent = model.last_request();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[0].role, Role::System);
    assert_eq!(sent[1].role, Role::System);
    assert!(sent[1].content.starts_with("Context from history:"));
    assert!(sent[1]
        .content
        .contains("- Previously: 'What's the weather like?' → Reply: 'Sunny and warm.'"));
    assert!(!sent[1].content.contains("rust"));
    assert_eq!(sent[2].role, Role::User);
    assert_eq!(sent[2].content, "How is the weather today?");
}

#[tokio::test]
async fn test_at_most_two_exchanges_are_recalled() {
    let tmp = TempDir::new().unwrap();
    let log = ChatLog::from_config(&test_config(&tmp).log);
    seed(&log, "weather in Paris?", "Rainy.");
    seed(&log, "weather in Rome?", "Hot.");
    seed(&log, "weather in Oslo?", "Cold.");

    let model = ScriptedModel::answering("ok");
    let mut orch = orchestrator(&tmp, Arc::new(KeywordEmbedder), model.clone());
    orch.send_message("and the weather here?").await;

    let sent = model.last_request();
    let block = &sent[1].content;
    assert_eq!(block.matches("- Previously:").count(), 2);
    // Equal scores keep log order.
    assert!(block.contains("Paris"));
    assert!(block.contains("Rome"));
    assert!(!block.contains("Oslo"));
}

#[tokio::test]
async fn test_exchange_is_persisted_in_order_with_embeddings() {
    let tmp = TempDir::new().unwrap();
    let model = ScriptedModel::answering("Cats are great.");
    let mut orch = orchestrator(&tmp, Arc::new(KeywordEmbedder), model);

    orch.send_message("Do you like my cat?").await;
    assert_eq!(orch.state(), ExchangeState::Idle);
    assert_eq!(orch.session().len(), 1);
    assert_eq!(orch.session().turns()[0].role, Role::System);

    let entries = orch.log().try_load_all().unwrap();
    assert_eq!(entries.len(), 1);
    let turns = &entries[0].conversation;
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role, Role::User);
    assert_eq!(turns[0].content, "Do you like my cat?");
    assert_eq!(turns[1].role, Role::Assistant);
    assert_eq!(turns[1].content, "Cats are great.");
    assert_eq!(turns[0].embedding.as_deref(), Some(&[0.0, 1.0, 0.0, 0.1][..]));
}

#[tokio::test]
async fn test_empty_input_changes_nothing() {
    let tmp = TempDir::new().unwrap();
    let model = ScriptedModel::answering("unused");
    let mut orch = orchestrator(&tmp, Arc::new(KeywordEmbedder), model.clone());

    assert_eq!(orch.send_message("").await, None);
    assert_eq!(orch.send_message("   \n\t").await, None);
    assert_eq!(orch.session().len(), 1);
    assert!(orch.log().try_load_all().unwrap().is_empty());
    assert!(model.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unreachable_embedding_still_replies() {
    let tmp = TempDir::new().unwrap();
    let log = ChatLog::from_config(&test_config(&tmp).log);
    seed(&log, "weather?", "Sunny.");

    let model = ScriptedModel::answering("Hello!");
    let mut orch = orchestrator(&tmp, Arc::new(UnreachableEmbedder), model.clone());

    let reply = orch.send_message("weather again?").await;
    assert_eq!(reply.as_deref(), Some("Hello!"));

    // No history block without embeddings.
    let sent = model.last_request();
    assert_eq!(sent.len(), 2);

    let entries = orch.log().try_load_all().unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries[1].conversation.iter().all(|t| t.embedding.is_none()));
}

#[tokio::test]
async fn test_chat_failure_returns_apology_and_persists_nothing() {
    let tmp = TempDir::new().unwrap();
    let mut orch = orchestrator(&tmp, Arc::new(KeywordEmbedder), ScriptedModel::failing());

    let reply = orch.send_message("hello").await;
    assert_eq!(reply.as_deref(), Some(APOLOGY));
    assert_eq!(orch.state(), ExchangeState::Idle);
    assert!(orch.log().try_load_all().unwrap().is_empty());

    // The unanswered user turn is still in the window and goes out on exit.
    assert_eq!(orch.session().len(), 2);
    orch.finalize();
    let entries = orch.log().try_load_all().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].conversation.len(), 1);
    assert_eq!(entries[0].conversation[0].content, "hello");
}

#[tokio::test]
async fn test_recall_uses_fresh_log_each_exchange() {
    let tmp = TempDir::new().unwrap();
    let model = ScriptedModel::answering("Noted.");
    let mut orch = orchestrator(&tmp, Arc::new(KeywordEmbedder), model.clone());

    orch.send_message("my cat is called Biscuit").await;
    orch.send_message("what is my cat called?").await;

    let sent = model.last_request();
    assert_eq!(sent.len(), 3);
    assert!(sent[1]
        .content
        .contains("- Previously: 'my cat is called Biscuit' → Reply: 'Noted.'"));
}

#[tokio::test]
async fn test_web_toggle_without_service_still_replies() {
    let tmp = TempDir::new().unwrap();
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let mut config = test_config(&tmp);
    config.web_search.url = format!("http://127.0.0.1:{}", port);
    config.web_search.timeout_secs = 2;

    let model = ScriptedModel::answering("fine");
    let mut orch = ChatOrchestrator::new(&config, Arc::new(KeywordEmbedder), model.clone()).unwrap();
    orch.toggle_web_search(true);
    assert!(orch.web_search_enabled());

    assert_eq!(orch.send_message("search something").await.as_deref(), Some("fine"));
    assert_eq!(model.last_request().len(), 2);
}

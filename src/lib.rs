//! # ai-assistant
//!
//! A local-first chat client that remembers. Each message is sent to a
//! local Ollama model together with recalled context: similar exchanges
//! from the persisted chat log, optional snippets from a folder of
//! markdown notes, and optional web-search results.
//!
//! ## Architecture
//!
//! ```text
//!   user text
//!       │
//!       ▼
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Orchestrator │──▶│  Retriever   │──▶│   ChatLog    │
//! │              │   │ (embeddings) │   │  (JSONL)     │
//! └──────┬───────┘   └──────────────┘   └──────▲───────┘
//!        │  files / web ─▶ Assembler           │
//!        ▼                                     │
//! ┌──────────────┐   ┌──────────────┐          │
//! │  ChatModel   │──▶│   Session    │── flush ─┘
//! │  (Ollama)    │   │ (6-turn win) │
//! └──────────────┘   └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Typed errors per layer |
//! | [`embedding`] | Embedding provider abstraction, cosine similarity |
//! | [`llm`] | Chat model abstraction and Ollama client |
//! | [`chat_log`] | Append-only JSONL conversation log |
//! | [`retriever`] | Similarity recall over the log |
//! | [`session`] | Bounded short-term memory |
//! | [`assembler`] | Context block assembly |
//! | [`files`] | Markdown folder lookup (file mode) |
//! | [`web_search`] | Web search (SearXNG-compatible) |
//! | [`orchestrator`] | One request/response cycle |

pub mod assembler;
pub mod chat_log;
pub mod config;
pub mod embedding;
pub mod error;
pub mod files;
pub mod llm;
pub mod models;
pub mod orchestrator;
pub mod retriever;
pub mod session;
pub mod web_search;

//! Error types for each layer of the context engine.
//!
//! Library layers return these typed errors; the [`ChatOrchestrator`]
//! decides which of them degrade a feature and which surface to the user.
//! Configuration loading and CLI commands use `anyhow` instead.
//!
//! [`ChatOrchestrator`]: crate::orchestrator::ChatOrchestrator

use std::path::PathBuf;

/// Failures from the remote embedding service.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding provider is disabled")]
    Disabled,
    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("embedding service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),
}

/// Failures from the remote chat model.
#[derive(Debug, thiserror::Error)]
pub enum ChatModelError {
    #[error("chat request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("chat model returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid chat response: {0}")]
    InvalidResponse(String),
}

/// Failures reading or writing the conversation log.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("chat log I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize log entry: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("malformed log entry: {0}")]
    Malformed(String),
}

/// Failures from the local-folder document search.
#[derive(Debug, thiserror::Error)]
pub enum FileModeError {
    #[error("no local folder configured for file mode")]
    FolderNotSet,
    #[error("local folder does not exist: {0}")]
    FolderMissing(PathBuf),
    #[error("failed to walk local folder: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("invalid glob pattern: {0}")]
    Glob(#[from] globset::Error),
    #[error("settings I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings file: {0}")]
    Settings(#[from] serde_json::Error),
}

/// Failures from the web-search collaborator.
#[derive(Debug, thiserror::Error)]
pub enum WebSearchError {
    #[error("web search request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("web search returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid web search response: {0}")]
    InvalidResponse(String),
}

//! TOML configuration parsing.
//!
//! Every section is optional; omitted fields take the defaults below: a
//! 6-turn window, a 0.7 similarity threshold, two recalled exchanges and a
//! temperature of 0.8.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::session::MIN_WINDOW_SIZE;

/// Path used by the CLI when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "./config/ai.toml";

const DEFAULT_SYSTEM_PROMPT: &str = "You are an AI named Ai. Keep a natural dialogue without \
repeated greetings. Answer as a friendly assistant, taking into account the context of the \
current and previous conversations, but do not repeat earlier answers. Try to be creative and \
focus on the user's latest request. If any information about the user was found in a specific \
file (other than the chat log), always say which file it came from.";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub files: FilesConfig,
    #[serde(default)]
    pub web_search: WebSearchConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_path")]
    pub path: PathBuf,
    #[serde(default = "default_backup_path")]
    pub backup_path: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: default_log_path(),
            backup_path: default_backup_path(),
        }
    }
}

fn default_log_path() -> PathBuf {
    PathBuf::from("chat_log.jsonl")
}
fn default_backup_path() -> PathBuf {
    PathBuf::from("chat_log_backup.txt")
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Keep the system turn at the head of the window when trimming.
    #[serde(default = "default_pin_system_turn")]
    pub pin_system_turn: bool,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            pin_system_turn: default_pin_system_turn(),
            system_prompt: default_system_prompt(),
        }
    }
}

fn default_window_size() -> usize {
    6
}
fn default_pin_system_turn() -> bool {
    true
}
fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_retrieval_max_results")]
    pub max_results: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            max_results: default_retrieval_max_results(),
        }
    }
}

fn default_similarity_threshold() -> f32 {
    0.7
}
fn default_retrieval_max_results() -> usize {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_ollama_url")]
    pub url: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            url: default_ollama_url(),
            max_retries: default_max_retries(),
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "ollama".to_string()
}
fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}
fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_max_retries() -> u32 {
    2
}
fn default_embedding_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_ollama_url")]
    pub url: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_chat_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: default_chat_model(),
            url: default_ollama_url(),
            temperature: default_temperature(),
            timeout_secs: default_chat_timeout_secs(),
        }
    }
}

fn default_chat_model() -> String {
    "llama3".to_string()
}
fn default_temperature() -> f32 {
    0.8
}
fn default_chat_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct FilesConfig {
    /// JSON file remembering the selected local folder between runs.
    #[serde(default = "default_settings_path")]
    pub settings_path: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default = "default_files_max_results")]
    pub max_results: usize,
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            settings_path: default_settings_path(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            max_results: default_files_max_results(),
            max_chunk_chars: default_max_chunk_chars(),
        }
    }
}

fn default_settings_path() -> PathBuf {
    PathBuf::from("settings.json")
}
fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string()]
}
fn default_files_max_results() -> usize {
    3
}
fn default_max_chunk_chars() -> usize {
    1200
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebSearchConfig {
    /// Initial state of the web-search toggle.
    #[serde(default)]
    pub enabled: bool,
    /// Base URL of a SearXNG-compatible instance.
    #[serde(default = "default_search_url")]
    pub url: String,
    #[serde(default = "default_web_max_results")]
    pub max_results: usize,
    #[serde(default = "default_web_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_search_url(),
            max_results: default_web_max_results(),
            timeout_secs: default_web_timeout_secs(),
        }
    }
}

fn default_search_url() -> String {
    "http://localhost:8888".to_string()
}
fn default_web_max_results() -> usize {
    3
}
fn default_web_timeout_secs() -> u64 {
    15
}

impl Config {
    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.session.window_size < MIN_WINDOW_SIZE {
            bail!("session.window_size must be >= {}", MIN_WINDOW_SIZE);
        }
        if self.retrieval.max_results == 0 {
            bail!("retrieval.max_results must be >= 1");
        }
        if !(-1.0..=1.0).contains(&self.retrieval.similarity_threshold) {
            bail!("retrieval.similarity_threshold must be in [-1.0, 1.0]");
        }
        if !(0.0..=2.0).contains(&self.chat.temperature) {
            bail!("chat.temperature must be in [0.0, 2.0]");
        }
        if self.files.max_chunk_chars == 0 {
            bail!("files.max_chunk_chars must be > 0");
        }

        match self.embedding.provider.as_str() {
            "disabled" | "ollama" => {}
            other => bail!(
                "Unknown embedding provider: '{}'. Must be disabled or ollama.",
                other
            ),
        }

        if self.embedding.is_enabled() && self.embedding.model.trim().is_empty() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                self.embedding.provider
            );
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}

/// Load `path`, or fall back to defaults when it is the implicit default
/// path and no file exists there.
pub fn load_config_or_default(path: &Path, explicit: bool) -> Result<Config> {
    if !explicit && !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(Config::default());
    }
    load_config(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.session.window_size, 6);
        assert!(config.session.pin_system_turn);
        assert!((config.retrieval.similarity_threshold - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.retrieval.max_results, 2);
        assert!((config.chat.temperature - 0.8).abs() < f32::EPSILON);
        assert_eq!(config.chat.model, "llama3");
        assert_eq!(config.embedding.model, "nomic-embed-text");
        assert_eq!(config.log.path, PathBuf::from("chat_log.jsonl"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_file_is_all_defaults() {
        let file = write_config("");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.session.window_size, 6);
        assert!(!config.web_search.enabled);
    }

    #[test]
    fn test_partial_section_overrides() {
        let file = write_config(
            r#"
[retrieval]
similarity_threshold = 0.5

[embedding]
provider = "disabled"
"#,
        );
        let config = load_config(file.path()).unwrap();
        assert!((config.retrieval.similarity_threshold - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.retrieval.max_results, 2);
        assert!(!config.embedding.is_enabled());
    }

    #[test]
    fn test_rejects_unknown_provider() {
        let file = write_config("[embedding]\nprovider = \"magic\"\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn test_rejects_tiny_window() {
        let file = write_config("[session]\nwindow_size = 1\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let file = write_config("[retrieval]\nsimilarity_threshold = 1.5\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_missing_default_path_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("ai.toml");
        let config = load_config_or_default(&missing, false).unwrap();
        assert_eq!(config.session.window_size, 6);
        assert!(load_config_or_default(&missing, true).is_err());
    }
}

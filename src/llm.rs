//! Chat model abstraction and the Ollama `/api/chat` client.
//!
//! The orchestrator only sees the [`ChatModel`] trait, so tests and
//! alternative runtimes can be plugged in without touching the pipeline.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ChatConfig;
use crate::error::ChatModelError;
use crate::models::ChatMessage;

/// Sampling options passed with each chat request.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ChatOptions {
    pub temperature: f32,
}

/// A remote chat model: ordered messages in, one reply out.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Returns the model identifier (e.g. `"llama3"`).
    fn model_name(&self) -> &str;

    /// Send the conversation and return the assistant's reply text.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: ChatOptions,
    ) -> Result<String, ChatModelError>;
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: ChatOptions,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaReply>,
}

#[derive(Deserialize)]
struct OllamaReply {
    #[serde(default)]
    content: String,
}

/// Chat model served by a local Ollama instance.
pub struct OllamaChat {
    model: String,
    url: String,
    client: reqwest::Client,
}

impl OllamaChat {
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            url: config.url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl ChatModel for OllamaChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: ChatOptions,
    ) -> Result<String, ChatModelError> {
        let request = OllamaChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.url))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        parse_chat_response(&text)
    }
}

fn parse_chat_response(body: &str) -> Result<String, ChatModelError> {
    let parsed: OllamaChatResponse = serde_json::from_str(body)
        .map_err(|e| ChatModelError::InvalidResponse(e.to_string()))?;

    parsed
        .message
        .map(|m| m.content)
        .ok_or_else(|| ChatModelError::InvalidResponse("missing message".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[test]
    fn test_request_shape() {
        let messages = vec![
            ChatMessage {
                role: Role::System,
                content: "be nice".to_string(),
            },
            ChatMessage {
                role: Role::User,
                content: "hi".to_string(),
            },
        ];
        let request = OllamaChatRequest {
            model: "llama3",
            messages: &messages,
            stream: false,
            options: ChatOptions { temperature: 0.5 },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "llama3");
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["options"]["temperature"], 0.5);
    }

    #[test]
    fn test_parse_chat_response() {
        let body = r#"{"model":"llama3","message":{"role":"assistant","content":"Привет!"},"done":true}"#;
        assert_eq!(parse_chat_response(body).unwrap(), "Привет!");
    }

    #[test]
    fn test_parse_chat_response_missing_message() {
        let body = r#"{"error":"model 'llama3' not found"}"#;
        assert!(matches!(
            parse_chat_response(body),
            Err(ChatModelError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_parse_chat_response_not_json() {
        assert!(parse_chat_response("<html>").is_err());
    }
}

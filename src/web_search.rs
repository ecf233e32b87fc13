//! Web search through a SearXNG-compatible JSON endpoint.
//!
//! Off by default. When enabled, each query is sent to
//! `GET {url}/search?q=...&format=json` and the first few hits are kept.

use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

use crate::config::WebSearchConfig;
use crate::error::WebSearchError;
use crate::models::WebResult;

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<WebResult>,
}

pub struct WebSearchHandler {
    enabled: bool,
    url: String,
    max_results: usize,
    client: reqwest::Client,
}

impl WebSearchHandler {
    pub fn new(config: &WebSearchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            enabled: config.enabled,
            url: config.url.trim_end_matches('/').to_string(),
            max_results: config.max_results,
            client,
        })
    }

    pub fn toggle_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Search results for `query`; empty on any failure.
    pub async fn perform_search(&self, query: &str) -> Vec<WebResult> {
        match self.try_search(query).await {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(url = %self.url, error = %e, "web search failed");
                Vec::new()
            }
        }
    }

    pub async fn try_search(&self, query: &str) -> Result<Vec<WebResult>, WebSearchError> {
        let response = self
            .client
            .get(format!("{}/search", self.url))
            .query(&[("q", query), ("format", "json")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WebSearchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        parse_search_response(&text, self.max_results)
    }
}

fn parse_search_response(body: &str, max_results: usize) -> Result<Vec<WebResult>, WebSearchError> {
    let parsed: SearchResponse =
        serde_json::from_str(body).map_err(|e| WebSearchError::InvalidResponse(e.to_string()))?;
    Ok(parsed.results.into_iter().take(max_results).collect())
}

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use super::types::{Document, no_results_document, placeholder_documents};
use crate::config::ApiKey;
use crate::retry::{MAX_RETRIES, jittered_backoff};

const API_BASE: &str = "https://serpapi.com/search";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Search API rate limit exceeded. Please retry later.")]
    RateLimited,

    #[error("Search API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid search URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Ranked snippet retrieval. Never yields an empty sequence: missing
/// configuration and transport failures degrade to placeholder context,
/// zero hits degrade to a single informational document.
///
/// Implemented by `WebSearchClient` for production; mock implementations
/// used in tests.
pub trait SnippetSearch {
    async fn search(&self, query: &str, n: usize) -> Vec<Document>;
}

#[derive(Debug, Deserialize)]
struct SerpSearchResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    snippet: Option<String>,
}

/// Snippet retrieval backed by the SerpApi Google engine.
#[derive(Clone)]
pub struct WebSearchClient {
    http: Client,
    api_key: Option<ApiKey>,
    base_url: String,
}

impl WebSearchClient {
    pub fn new(http: Client, api_key: Option<ApiKey>) -> Self {
        if api_key.is_none() {
            warn!("SERPAPI_API_KEY not configured; web search will return placeholder context");
        }
        Self {
            http,
            api_key,
            base_url: API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            api_key: Some(ApiKey::new("test-key")),
            base_url: base_url.to_string(),
        }
    }

    async fn fetch_snippets(
        &self,
        query: &str,
        n: usize,
        key: &ApiKey,
    ) -> Result<Vec<String>, SearchError> {
        let count = n.to_string();
        let url = Url::parse_with_params(
            &self.base_url,
            &[
                ("engine", "google"),
                ("q", query),
                ("num", count.as_str()),
                ("api_key", key.as_str()),
            ],
        )?;

        debug_assert!(
            url.as_str().starts_with("https://") || cfg!(test),
            "API key must only be sent over HTTPS"
        );

        let response = self
            .http
            .get(url)
            .header("User-Agent", crate::USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        match status.as_u16() {
            200..=299 => {
                let body: SerpSearchResponse = response.json().await?;
                let snippets = body
                    .organic_results
                    .into_iter()
                    .take(n)
                    .map(|r| r.snippet.unwrap_or_else(|| "No snippet available.".to_string()))
                    .collect();
                Ok(snippets)
            }
            429 => Err(SearchError::RateLimited),
            _ => {
                let message = extract_error_message(
                    &response
                        .text()
                        .await
                        .unwrap_or_else(|_| format!("HTTP {status}")),
                );
                Err(SearchError::Api {
                    code: status.as_u16(),
                    message,
                })
            }
        }
    }

    async fn fetch_with_retry(
        &self,
        query: &str,
        n: usize,
        key: &ApiKey,
    ) -> Result<Vec<String>, SearchError> {
        let mut last_err = None;
        for attempt in 0..MAX_RETRIES {
            match self.fetch_snippets(query, n, key).await {
                Ok(snippets) => return Ok(snippets),
                Err(e) if is_retriable(&e) => {
                    last_err = Some(e);
                    if attempt + 1 < MAX_RETRIES {
                        let delay_ms = jittered_backoff(attempt);
                        debug!(attempt = attempt + 1, delay_ms, "retrying after transient error");
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or(SearchError::RateLimited))
    }
}

impl SnippetSearch for WebSearchClient {
    async fn search(&self, query: &str, n: usize) -> Vec<Document> {
        let Some(key) = &self.api_key else {
            info!(query = %query, "web search unconfigured; using placeholder context");
            return placeholder_documents(query);
        };

        match self.fetch_with_retry(query, n, key).await {
            Ok(snippets) if snippets.is_empty() => {
                info!(query = %query, "web search returned no results");
                vec![no_results_document(query)]
            }
            Ok(snippets) => {
                info!(query = %query, count = snippets.len(), "web search complete");
                snippets.into_iter().map(Document::real).collect()
            }
            Err(e) => {
                warn!(error = %e, query = %query, "web search failed; using placeholder context");
                placeholder_documents(query)
            }
        }
    }
}

fn is_retriable(e: &SearchError) -> bool {
    matches!(
        e,
        SearchError::RateLimited
            | SearchError::Api {
                code: 500..=599,
                ..
            }
    )
}

/// SerpApi reports failures as `{"error": "..."}`.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| {
            let end = body.floor_char_boundary(200);
            body[..end].to_string()
        })
}

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use super::types::{ImageRef, RetrievedImages, placeholder_images};
use crate::config::ApiKey;
use crate::retry::{MAX_RETRIES, jittered_backoff};

const API_BASE: &str = "https://serpapi.com/search";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum ImageSearchError {
    #[error("Image search API rate limit exceeded. Please retry later.")]
    RateLimited,

    #[error("Image search API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid search URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Ranked image retrieval for a text query. Never fails: missing
/// configuration, zero hits, and transport errors all degrade to a fixed
/// placeholder image with an explanatory status message.
///
/// Implemented by `WebImageClient` for production; mock implementations
/// used in tests.
pub trait ImageSearch {
    async fn search(&self, query: &str, n: usize) -> RetrievedImages;
}

#[derive(Debug, Deserialize)]
struct SerpImagesResponse {
    #[serde(default)]
    images_results: Vec<ImageResult>,
}

#[derive(Debug, Deserialize)]
struct ImageResult {
    original: Option<String>,
    thumbnail: Option<String>,
}

/// Image retrieval backed by the SerpApi Google Images engine.
#[derive(Clone)]
pub struct WebImageClient {
    http: Client,
    api_key: Option<ApiKey>,
    base_url: String,
}

impl WebImageClient {
    pub fn new(http: Client, api_key: Option<ApiKey>) -> Self {
        if api_key.is_none() {
            warn!("SERPAPI_API_KEY not configured; image search will return a placeholder image");
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

    async fn fetch_references(
        &self,
        query: &str,
        n: usize,
        key: &ApiKey,
    ) -> Result<Vec<ImageRef>, ImageSearchError> {
        let count = n.to_string();
        let url = Url::parse_with_params(
            &self.base_url,
            &[
                ("engine", "google_images"),
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
                let body: SerpImagesResponse = response.json().await?;
                let references = body
                    .images_results
                    .into_iter()
                    .filter_map(|r| r.original.or(r.thumbnail))
                    .take(n)
                    .map(ImageRef::new)
                    .collect();
                Ok(references)
            }
            429 => Err(ImageSearchError::RateLimited),
            _ => {
                let message = extract_error_message(
                    &response
                        .text()
                        .await
                        .unwrap_or_else(|_| format!("HTTP {status}")),
                );
                Err(ImageSearchError::Api {
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
    ) -> Result<Vec<ImageRef>, ImageSearchError> {
        let mut last_err = None;
        for attempt in 0..MAX_RETRIES {
            match self.fetch_references(query, n, key).await {
                Ok(references) => return Ok(references),
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
        Err(last_err.unwrap_or(ImageSearchError::RateLimited))
    }
}

impl ImageSearch for WebImageClient {
    async fn search(&self, query: &str, n: usize) -> RetrievedImages {
        let Some(key) = &self.api_key else {
            info!(query = %query, "image search unconfigured; using placeholder image");
            return placeholder_images(query);
        };

        match self.fetch_with_retry(query, n, key).await {
            Ok(images) if images.is_empty() => {
                info!(query = %query, "image search returned no results");
                placeholder_images(query)
            }
            Ok(images) => {
                info!(query = %query, count = images.len(), "image search complete");
                let message = format!("Found {} web images for '{query}'.", images.len());
                RetrievedImages { images, message }
            }
            Err(e) => {
                warn!(error = %e, query = %query, "image search failed; using placeholder image");
                placeholder_images(query)
            }
        }
    }
}

fn is_retriable(e: &ImageSearchError) -> bool {
    matches!(
        e,
        ImageSearchError::RateLimited
            | ImageSearchError::Api {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limits_and_server_errors_are_retriable() {
        assert!(is_retriable(&ImageSearchError::RateLimited));
        assert!(is_retriable(&ImageSearchError::Api {
            code: 503,
            message: "unavailable".into()
        }));
        assert!(!is_retriable(&ImageSearchError::Api {
            code: 401,
            message: "bad key".into()
        }));
    }

    #[tokio::test]
    async fn missing_key_skips_network_and_returns_placeholder() {
        // No server at all: a network attempt would error loudly.
        let client = WebImageClient::new(Client::new(), None);
        let retrieved = client.search("burn treatment", 3).await;

        assert_eq!(retrieved.images.len(), 1);
        assert!(retrieved.images[0].is_inline());
        assert!(retrieved.message.starts_with("Simulated web image retrieval"));
    }
}

#[cfg(test)]
mod http_tests {
    use super::*;
    use crate::images::types::PLACEHOLDER_IMAGE;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn search_prefers_original_over_thumbnail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("engine", "google_images"))
            .and(query_param("q", "skin rash"))
            .and(query_param("api_key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "images_results": [
                    {"original": "https://img.example/full-1.jpg", "thumbnail": "https://img.example/thumb-1.jpg"},
                    {"thumbnail": "https://img.example/thumb-2.jpg"},
                    {"original": "https://img.example/full-3.jpg"}
                ]
            })))
            .mount(&server)
            .await;

        let client = WebImageClient::with_base_url(Client::new(), &server.uri());
        let retrieved = client.search("skin rash", 2).await;

        assert_eq!(
            retrieved.images,
            vec![
                ImageRef::new("https://img.example/full-1.jpg"),
                ImageRef::new("https://img.example/thumb-2.jpg"),
            ]
        );
        assert_eq!(retrieved.message, "Found 2 web images for 'skin rash'.");
    }

    #[tokio::test]
    async fn zero_hits_degrade_to_placeholder() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"images_results": []})),
            )
            .mount(&server)
            .await;

        let client = WebImageClient::with_base_url(Client::new(), &server.uri());
        let retrieved = client.search("rare syndrome", 3).await;

        assert_eq!(retrieved.images.len(), 1);
        assert_eq!(retrieved.images[0].as_str(), PLACEHOLDER_IMAGE);
        assert_eq!(
            retrieved.message,
            "Simulated web image retrieval for: rare syndrome. Integrate a live search API for real images."
        );
    }

    #[tokio::test]
    async fn api_failure_degrades_to_placeholder() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_json(serde_json::json!({"error": "Invalid API key."})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = WebImageClient::with_base_url(Client::new(), &server.uri());
        let retrieved = client.search("fracture", 3).await;

        assert_eq!(retrieved.images[0].as_str(), PLACEHOLDER_IMAGE);
    }

    #[tokio::test]
    async fn rate_limit_is_retried_then_degrades() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .expect(3)
            .mount(&server)
            .await;

        let client = WebImageClient::with_base_url(Client::new(), &server.uri());
        let retrieved = client.search("fever", 3).await;

        assert_eq!(retrieved.images[0].as_str(), PLACEHOLDER_IMAGE);
    }
}

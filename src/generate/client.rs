use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::types::ChatMessage;
use crate::config::ApiKey;
use crate::retry::{MAX_RETRIES, jittered_backoff};

const API_URL: &str = "https://router.huggingface.co/v1/chat/completions";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_OUTPUT_TOKENS: u32 = 500;
/// Near-deterministic sampling keeps grounded answers reproducible.
const TEMPERATURE: f32 = 0.1;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Chat API rate limit exceeded. Please retry later.")]
    RateLimited,

    #[error("Chat API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("LLM API returned an unexpected structure: {0}")]
    UnexpectedShape(String),
}

/// Chat-style text generation over an OpenAI-compatible completions API.
/// Implemented by `ChatClient` for production; mock implementations used in tests.
pub trait ChatCompletion {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ChatError>;
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Client for the Hugging Face router's chat completions endpoint.
#[derive(Clone)]
pub struct ChatClient {
    http: Client,
    api_key: ApiKey,
    model: String,
    url: String,
}

impl ChatClient {
    pub fn new(http: Client, api_key: ApiKey, model: impl Into<String>) -> Self {
        Self {
            http,
            api_key,
            model: model.into(),
            url: API_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            api_key: ApiKey::new("test-key"),
            model: "test-model".to_string(),
            url: format!("{base_url}/v1/chat/completions"),
        }
    }

    async fn request_completion(&self, messages: &[ChatMessage]) -> Result<String, ChatError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            max_tokens: MAX_OUTPUT_TOKENS,
            temperature: TEMPERATURE,
        };

        debug_assert!(
            self.url.starts_with("https://") || cfg!(test),
            "API key must only be sent over HTTPS"
        );

        let response = self
            .http
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key.as_str()))
            .header("User-Agent", crate::USER_AGENT)
            .json(&request)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("chat API rate limited");
            return Err(ChatError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let snippet = &text[..text.floor_char_boundary(200)];
            warn!(status = %status, "chat API error");
            return Err(ChatError::Api {
                code: status.as_u16(),
                message: format!("HTTP {status}: {snippet}"),
            });
        }

        let text = response.text().await?;
        let body: ChatCompletionResponse =
            serde_json::from_str(&text).map_err(|_| ChatError::UnexpectedShape(shape_detail(&text)))?;

        let Some(choice) = body.choices.into_iter().next() else {
            return Err(ChatError::UnexpectedShape(shape_detail(&text)));
        };

        debug!(model = %self.model, "chat completion received");
        Ok(choice.message.content)
    }
}

impl ChatCompletion for ChatClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ChatError> {
        let mut last_err = None;
        for attempt in 0..MAX_RETRIES {
            match self.request_completion(messages).await {
                Ok(content) => return Ok(content),
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
        Err(last_err.unwrap_or(ChatError::RateLimited))
    }
}

fn is_retriable(e: &ChatError) -> bool {
    matches!(
        e,
        ChatError::RateLimited
            | ChatError::Api {
                code: 500..=599,
                ..
            }
    )
}

fn shape_detail(body: &str) -> String {
    body[..body.floor_char_boundary(200)].to_string()
}

//! Environment-backed configuration for the remote service credentials.

use std::env;

pub const DEFAULT_RAG_MODEL: &str = "HuggingFaceTB/SmolLM3-3B:hf-inference";

/// Remote service credential that never prints its value.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Credentials and model selection, read once at process start.
/// Absent credentials select each leaf's degraded behavior; no component
/// reads the environment after this snapshot.
#[derive(Debug, Clone)]
pub struct Config {
    pub serpapi_key: Option<ApiKey>,
    pub use_serpapi: bool,
    pub huggingface_key: Option<ApiKey>,
    pub rag_model: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            serpapi_key: non_empty(env::var("SERPAPI_API_KEY").ok()).map(ApiKey),
            use_serpapi: parse_use_serpapi(env::var("USE_SERPAPI").ok()),
            huggingface_key: non_empty(env::var("HUGGINGFACE_API_KEY").ok()).map(ApiKey),
            rag_model: non_empty(env::var("HUGGINGFACE_RAG_MODEL").ok())
                .unwrap_or_else(|| DEFAULT_RAG_MODEL.to_string()),
        }
    }
}

/// Live search runs only when the flag is unset or exactly "true"
/// (case-insensitive). Any other value forces placeholder retrieval.
fn parse_use_serpapi(value: Option<String>) -> bool {
    match value {
        Some(v) => v.trim().to_lowercase() == "true",
        None => true,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

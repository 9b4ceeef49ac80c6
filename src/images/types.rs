use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::Serialize;

/// A displayable image reference: a remote URL or an inline `data:` URL
/// that renders with no further network access. Both are opaque to the
/// orchestrator and serialize as plain strings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Re-encode raw bytes as a self-contained data URL. A blank content
    /// type falls back to the generic octet-stream MIME.
    pub fn inline(content_type: &str, bytes: &[u8]) -> Self {
        let mime = content_type.trim();
        let mime = if mime.is_empty() {
            "application/octet-stream"
        } else {
            mime
        };
        Self(format!("data:{mime};base64,{}", STANDARD.encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_inline(&self) -> bool {
        self.0.starts_with("data:")
    }
}

/// 1x1 transparent GIF shown when live image search is unavailable.
pub const PLACEHOLDER_IMAGE: &str =
    "data:image/gif;base64,R0lGODlhAQABAIAAAAAAAP///yH5BAEAAAAALAAAAAABAAEAAAIBRAA7";

/// Image search output: ranked references plus a human-readable status.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedImages {
    pub images: Vec<ImageRef>,
    pub message: String,
}

/// Fixed single-image fallback for unconfigured or failed image search.
pub fn placeholder_images(query: &str) -> RetrievedImages {
    RetrievedImages {
        images: vec![ImageRef::new(PLACEHOLDER_IMAGE)],
        message: format!(
            "Simulated web image retrieval for: {query}. Integrate a live search API for real images."
        ),
    }
}

use tracing::warn;

use super::types::ImageRef;
use crate::generate::{ChatCompletion, ChatMessage};

const CAPTION_PROMPT: &str =
    "Describe this medical image in one or two short sentences, focusing on what is visible.";

/// Caption used whenever no vision-capable model answers.
pub const FALLBACK_CAPTION: &str =
    "An uploaded medical image (caption unavailable without a vision model).";

/// Turns uploaded bytes into inline previews and best-effort captions.
pub struct ImageIngestor<C> {
    chat: Option<C>,
}

impl<C: ChatCompletion> ImageIngestor<C> {
    pub fn new(chat: Option<C>) -> Self {
        Self { chat }
    }

    /// Re-encode an upload as a self-contained preview. Never fails: any
    /// byte sequence encodes, regardless of whether it is a valid image.
    pub fn ingest(&self, bytes: &[u8], content_type: &str) -> ImageRef {
        ImageRef::inline(content_type, bytes)
    }

    /// Caption an upload with a vision-capable completion. Missing
    /// configuration, transport failures, and blank replies all fall back
    /// to a fixed caption so callers never observe an error.
    pub async fn describe(&self, bytes: &[u8], content_type: &str) -> String {
        let Some(chat) = &self.chat else {
            return FALLBACK_CAPTION.to_string();
        };

        let preview = ImageRef::inline(content_type, bytes);
        let messages = [ChatMessage::user_with_image(CAPTION_PROMPT, preview.as_str())];

        match chat.complete(&messages).await {
            Ok(caption) if !caption.trim().is_empty() => caption.trim().to_string(),
            Ok(_) => {
                warn!("image captioning returned an empty reply, using fixed caption");
                FALLBACK_CAPTION.to_string()
            }
            Err(e) => {
                warn!(error = %e, "image captioning failed, using fixed caption");
                FALLBACK_CAPTION.to_string()
            }
        }
    }
}

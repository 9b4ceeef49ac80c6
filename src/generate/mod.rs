//! Grounded answer generation with soft failure: every degraded path
//! returns an explanatory string instead of an error.

mod client;
mod types;

pub use client::{ChatClient, ChatCompletion, ChatError};
pub use types::{ChatMessage, ContentPart, ImageUrl, MessageContent};

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::retrieval::Document;

const SYSTEM_PROMPT: &str = "You are a professional medical chatbot. Answer the user's QUESTION \
    concisely and accurately based ONLY on the context provided below. If the context does not \
    contain the answer, politely state that you cannot answer from the provided documents. Do \
    not use external knowledge. Always maintain a professional tone.";

const CONTEXT_SEPARATOR: &str = "\n---\n";

const MISSING_KEY_ANSWER: &str = "Answer Generation Failed: HUGGINGFACE_API_KEY is missing.";
const NO_CONTEXT_ANSWER: &str = "No web results were retrieved. Cannot generate an answer.";
const PLACEHOLDER_CONTEXT_ANSWER: &str = "Answer generated successfully! (Using placeholder web \
    context. Integrate a live search API for real information.)";

/// Some models wrap chain-of-thought in think tags; callers never see it.
static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid literal pattern"));

/// Retrieval-augmented answer generation over an optional chat backend.
pub struct AnswerGenerator<C> {
    chat: Option<C>,
}

impl<C: ChatCompletion> AnswerGenerator<C> {
    pub fn new(chat: Option<C>) -> Self {
        Self { chat }
    }

    /// Answer `query` grounded in `documents`.
    ///
    /// Fails soft, in order: missing credential, no documents, synthetic
    /// placeholder context (none of which spends a remote call), then
    /// transport errors from the live call.
    pub async fn generate(&self, query: &str, documents: &[Document]) -> String {
        let Some(chat) = &self.chat else {
            return MISSING_KEY_ANSWER.to_string();
        };
        if documents.is_empty() {
            return NO_CONTEXT_ANSWER.to_string();
        }
        if documents[0].synthetic {
            return PLACEHOLDER_CONTEXT_ANSWER.to_string();
        }

        let context = documents
            .iter()
            .map(|d| d.text.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);
        let user_content = format!("### CONTEXT DOCUMENTS:\n{context}\n\n### QUESTION:\n{query}");
        let messages = [
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(user_content),
        ];

        match chat.complete(&messages).await {
            Ok(content) => strip_reasoning(&content),
            Err(e @ ChatError::UnexpectedShape(_)) => {
                warn!(error = %e, "answer generation got a malformed response");
                e.to_string()
            }
            Err(e) => {
                warn!(error = %e, "answer generation failed");
                format!("Answer Generation Failed due to API connection error: {e}")
            }
        }
    }
}

fn strip_reasoning(content: &str) -> String {
    THINK_BLOCK
        .replace_all(content.trim(), "")
        .trim()
        .to_string()
}

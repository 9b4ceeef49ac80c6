use serde::{Serialize, Serializer};

/// A retrieved context snippet. Sequence order reflects relevance rank
/// from the retrieval source, most relevant first.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub text: String,
    /// True when the text is fixed fallback filler rather than real
    /// retrieval output. Generation refuses to ground on synthetic context.
    pub synthetic: bool,
}

impl Document {
    pub fn real(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            synthetic: false,
        }
    }

    pub fn placeholder(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            synthetic: true,
        }
    }
}

/// Serializes as the text alone; the synthetic flag is orchestration-internal
/// and callers receive documents as plain strings.
impl Serialize for Document {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.text)
    }
}

/// Fixed stand-in context returned when live retrieval is unavailable.
pub fn placeholder_documents(query: &str) -> Vec<Document> {
    vec![
        Document::placeholder(
            "Placeholder Context 1: **Web Retrieval is LIVE!** The internet source confirms \
             that the symptoms of fever include elevated body temperature and chills.",
        ),
        Document::placeholder(
            "Placeholder Context 2: **LLM Active!** The external LLM is now generating an \
             answer based on this web-fetched context.",
        ),
        Document::placeholder(format!(
            "Placeholder Context 3: All data is currently simulated for structure validation. \
             Original query was: '{query}'."
        )),
    ]
}

/// Single informational document for a search that genuinely found nothing.
/// Not synthetic: an empty result set is real evidence, and generation may
/// still reason about it.
pub fn no_results_document(query: &str) -> Document {
    Document::real(format!("No web results found for '{query}'."))
}

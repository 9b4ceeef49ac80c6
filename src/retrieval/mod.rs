//! Web snippet retrieval with placeholder degradation.

mod client;
mod types;

pub use client::{SnippetSearch, WebSearchClient};
pub use types::{Document, no_results_document, placeholder_documents};

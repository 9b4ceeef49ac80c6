use serde::Serialize;

use crate::entities::Entity;
use crate::images::ImageRef;
use crate::mode::ProcessingMode;
use crate::retrieval::Document;

/// Legacy text-chat result: the answer plus the context and entities
/// behind it.
#[derive(Debug, Serialize)]
pub struct ChatOutcome {
    pub answer: String,
    pub source_documents: Vec<Document>,
    pub ner_results: Vec<Entity>,
}

/// The single response shape every mode produces. Fields a mode does not
/// populate are present but empty (`answer` serializes as `null`), so
/// clients treat every response uniformly regardless of mode.
#[derive(Debug, Serialize)]
pub struct UnifiedResponse {
    pub mode: ProcessingMode,
    pub answer: Option<String>,
    pub images: Vec<ImageRef>,
    #[serde(rename = "ner_results")]
    pub entities: Vec<Entity>,
    pub source_documents: Vec<Document>,
    pub message: String,
}

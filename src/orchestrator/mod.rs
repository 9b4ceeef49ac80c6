//! Request orchestration: resolves a raw query to a concrete processing
//! mode and sequences retrieval, entity extraction, generation, and image
//! services into a single uniform response.
//!
//! Past input validation nothing here fails: every leaf degrades to its
//! own fallback value and the response always comes back whole.

mod request;
mod response;

pub use request::{ChatQuery, ResolvedRequest, UploadedImage, ValidationError};
pub use response::{ChatOutcome, UnifiedResponse};

use reqwest::Client;
use tracing::info;

use crate::config::Config;
use crate::entities::EntityExtractor;
use crate::generate::{AnswerGenerator, ChatClient, ChatCompletion};
use crate::images::{ImageIngestor, ImageSearch, RetrievedImages, WebImageClient};
use crate::mode::ProcessingMode;
use crate::retrieval::{SnippetSearch, WebSearchClient};

/// Snippets requested per text retrieval.
const SEARCH_RESULTS: usize = 3;
/// References requested per image retrieval.
const IMAGE_RESULTS: usize = 3;
/// Derived image query when an upload carries no usable filename.
const DEFAULT_IMAGE_QUERY: &str = "medical reference image";

const TEXT_CHAT_MESSAGE: &str = "Processed text query with web retrieval and grounded generation.";

pub struct Orchestrator<S, C, I> {
    search: S,
    generator: AnswerGenerator<C>,
    ingestor: ImageIngestor<C>,
    images: I,
    extractor: EntityExtractor,
}

/// Orchestrator wired to the live service clients.
pub type ProductionOrchestrator = Orchestrator<WebSearchClient, ChatClient, WebImageClient>;

impl ProductionOrchestrator {
    /// Wire up live clients from configuration. Absent credentials produce
    /// clients that answer with their fixed fallbacks instead of failing,
    /// and `USE_SERPAPI=false` forces the search clients into fallback mode
    /// even when a key is present.
    pub fn from_config(http: Client, config: &Config) -> Self {
        let serp_key = config
            .use_serpapi
            .then(|| config.serpapi_key.clone())
            .flatten();
        let chat = config
            .huggingface_key
            .clone()
            .map(|key| ChatClient::new(http.clone(), key, config.rag_model.clone()));

        Self::new(
            WebSearchClient::new(http.clone(), serp_key.clone()),
            AnswerGenerator::new(chat.clone()),
            ImageIngestor::new(chat),
            WebImageClient::new(http, serp_key),
        )
    }
}

impl<S, C, I> Orchestrator<S, C, I>
where
    S: SnippetSearch,
    C: ChatCompletion,
    I: ImageSearch,
{
    pub fn new(
        search: S,
        generator: AnswerGenerator<C>,
        ingestor: ImageIngestor<C>,
        images: I,
    ) -> Self {
        Self {
            search,
            generator,
            ingestor,
            images,
            extractor: EntityExtractor::new(),
        }
    }

    /// Resolve a raw query and run the full pipeline for its mode. The only
    /// error is client input validation; everything downstream degrades
    /// inside the response instead.
    pub async fn handle(&self, query: ChatQuery) -> Result<UnifiedResponse, ValidationError> {
        let request = ResolvedRequest::from_query(query)?;
        info!(mode = %request.mode(), "dispatching request");

        let response = match request {
            ResolvedRequest::TextToText { text } => self.text_to_text(&text).await,
            ResolvedRequest::TextToImage { text } => self.text_to_image(&text).await,
            ResolvedRequest::ImageToText { image } => self.image_to_text(&image).await,
            ResolvedRequest::ImageAndText { text, image } => {
                self.image_and_text(&text, &image).await
            }
        };
        Ok(response)
    }

    /// Text-only pipeline for the legacy chat surface. Unlike
    /// [`Self::handle`], entities come from the most relevant retrieved
    /// document rather than from the query text.
    pub async fn chat_with_context(&self, text: &str) -> ChatOutcome {
        let documents = self.search.search(text, SEARCH_RESULTS).await;
        let entities = documents
            .first()
            .map(|doc| self.extractor.extract(&doc.text))
            .unwrap_or_default();
        let answer = self.generator.generate(text, &documents).await;

        ChatOutcome {
            answer,
            source_documents: documents,
            ner_results: entities,
        }
    }

    /// Image retrieval alone, for the legacy image-search surface.
    pub async fn search_images(&self, query: &str) -> RetrievedImages {
        self.images.search(query, IMAGE_RESULTS).await
    }

    async fn text_to_text(&self, text: &str) -> UnifiedResponse {
        let documents = self.search.search(text, SEARCH_RESULTS).await;
        let entities = self.extractor.extract(text);
        let answer = self.generator.generate(text, &documents).await;

        UnifiedResponse {
            mode: ProcessingMode::TextToText,
            answer: Some(answer),
            images: Vec::new(),
            entities,
            source_documents: documents,
            message: TEXT_CHAT_MESSAGE.to_string(),
        }
    }

    async fn text_to_image(&self, text: &str) -> UnifiedResponse {
        // Image and context retrieval are independent; only generation
        // needs the retrieved documents.
        let (retrieved, documents) = tokio::join!(
            self.images.search(text, IMAGE_RESULTS),
            self.search.search(text, SEARCH_RESULTS),
        );
        let prompt = descriptive_prompt(text);
        let answer = self.generator.generate(&prompt, &documents).await;

        UnifiedResponse {
            mode: ProcessingMode::TextToImage,
            answer: Some(answer),
            images: retrieved.images,
            entities: Vec::new(),
            source_documents: documents,
            message: retrieved.message,
        }
    }

    async fn image_to_text(&self, image: &UploadedImage) -> UnifiedResponse {
        let preview = self.ingestor.ingest(&image.bytes, &image.content_type);
        let query = query_from_filename(image.filename.as_deref());
        let (description, mut retrieved) = tokio::join!(
            self.ingestor.describe(&image.bytes, &image.content_type),
            self.images.search(&query, IMAGE_RESULTS),
        );

        // The uploaded image always leads the sequence.
        retrieved.images.insert(0, preview);

        UnifiedResponse {
            mode: ProcessingMode::ImageToText,
            answer: Some(description),
            images: retrieved.images,
            entities: Vec::new(),
            source_documents: Vec::new(),
            message: retrieved.message,
        }
    }

    async fn image_and_text(&self, text: &str, image: &UploadedImage) -> UnifiedResponse {
        let preview = self.ingestor.ingest(&image.bytes, &image.content_type);
        let description = self.ingestor.describe(&image.bytes, &image.content_type).await;
        let combined = format!("{text} / {description}");

        let image_query = query_from_filename(image.filename.as_deref());
        let (documents, mut retrieved) = tokio::join!(
            self.search.search(&combined, SEARCH_RESULTS),
            self.images.search(&image_query, IMAGE_RESULTS),
        );
        let entities = self.extractor.extract(&combined);
        let answer = self.generator.generate(&combined, &documents).await;

        retrieved.images.insert(0, preview);

        UnifiedResponse {
            mode: ProcessingMode::ImageAndText,
            answer: Some(answer),
            images: retrieved.images,
            entities,
            source_documents: documents,
            message: retrieved.message,
        }
    }
}

/// Fixed prompt template for the prose answer accompanying image results.
fn descriptive_prompt(text: &str) -> String {
    format!(
        "Describe in one short paragraph what an illustrative medical image for \"{text}\" would typically show."
    )
}

/// Derive an image-search query from an upload's filename: final extension
/// stripped, separators spaced out, generic term when nothing usable remains.
fn query_from_filename(filename: Option<&str>) -> String {
    let Some(name) = filename else {
        return DEFAULT_IMAGE_QUERY.to_string();
    };
    let stem = name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name);
    let cleaned = stem.replace(['_', '-'], " ");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        DEFAULT_IMAGE_QUERY.to_string()
    } else {
        cleaned.to_string()
    }
}

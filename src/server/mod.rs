//! HTTP surface: multipart chat endpoints over the orchestrator.

use std::sync::Arc;

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::orchestrator::{
    ChatQuery, ProductionOrchestrator, UnifiedResponse, UploadedImage, ValidationError,
};

/// Cap on a single uploaded file.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
/// Whole-body cap: the upload plus multipart framing and text fields.
const MAX_BODY_BYTES: usize = MAX_UPLOAD_BYTES + 64 * 1024;

pub type SharedOrchestrator = Arc<ProductionOrchestrator>;

/// Errors surfaced to HTTP callers, as `{"detail": ...}` bodies.
#[derive(Debug, thiserror::Error)]
enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Invalid multipart form data: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Uploaded file exceeds the {limit} MiB limit.", limit = MAX_UPLOAD_BYTES / (1024 * 1024))]
    UploadTooLarge,

    #[error("Please provide a text query for the web image search.")]
    MissingImageQuery,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Multipart(_) | Self::MissingImageQuery => {
                StatusCode::BAD_REQUEST
            }
            Self::UploadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(serde_json::json!({ "detail": self.to_string() }));
        (status, body).into_response()
    }
}

pub fn create_router(orchestrator: SharedOrchestrator) -> Router {
    Router::new()
        .route("/api/status", get(status_handler))
        .route("/multimodal_chat", post(multimodal_chat_handler))
        .route("/chat", post(chat_handler))
        .route("/search_image_web", post(search_image_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(orchestrator)
}

/// Bind and serve until the process is stopped.
pub async fn run(addr: &str, orchestrator: ProductionOrchestrator) -> std::io::Result<()> {
    let router = create_router(Arc::new(orchestrator));
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router).await
}

async fn status_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "message": "Multimodal triage service is running.",
    }))
}

async fn multimodal_chat_handler(
    State(orchestrator): State<SharedOrchestrator>,
    multipart: Multipart,
) -> Result<Json<UnifiedResponse>, ApiError> {
    let query = parse_chat_query(multipart).await?;
    let response = orchestrator.handle(query).await?;
    Ok(Json(response))
}

/// Legacy text-chat endpoint: accepts the same form but always runs the
/// text pipeline and reports entities from the most relevant document.
async fn chat_handler(
    State(orchestrator): State<SharedOrchestrator>,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let query = parse_chat_query(multipart).await?;
    let text = query
        .text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ValidationError::MissingText)?;

    let outcome = orchestrator.chat_with_context(text).await;
    Ok(Json(serde_json::json!({
        "status": "success",
        "answer": outcome.answer,
        "source_documents": outcome.source_documents,
        "ner_results": outcome.ner_results,
    })))
}

async fn search_image_handler(
    State(orchestrator): State<SharedOrchestrator>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut query = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("query") {
            query = Some(field.text().await?);
        }
    }
    let query = query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or(ApiError::MissingImageQuery)?;

    let retrieved = orchestrator.search_images(query).await;
    Ok(Json(serde_json::json!({
        "status": "success",
        "results": retrieved.images,
        "message": retrieved.message,
    })))
}

/// Collect the `text_query`, `mode`, and `file` parts of the chat form.
/// Unknown parts are skipped so clients can evolve independently.
async fn parse_chat_query(mut multipart: Multipart) -> Result<ChatQuery, ApiError> {
    let mut query = ChatQuery::default();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(String::from) else {
            continue;
        };
        match name.as_str() {
            "text_query" => query.text = Some(field.text().await?),
            "mode" => query.mode = Some(field.text().await?),
            "file" => {
                if let Some(image) = read_upload(field).await? {
                    query.image = Some(image);
                }
            }
            _ => {}
        }
    }

    Ok(query)
}

/// Read an upload in chunks, enforcing the size cap mid-stream. A file
/// part with no content (an empty file input) counts as no upload.
async fn read_upload(mut field: Field<'_>) -> Result<Option<UploadedImage>, ApiError> {
    let filename = field
        .file_name()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(String::from);
    let content_type = field
        .content_type()
        .map(String::from)
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let mut bytes = Vec::new();
    while let Some(chunk) = field.chunk().await? {
        if bytes.len() + chunk.len() > MAX_UPLOAD_BYTES {
            return Err(ApiError::UploadTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if bytes.is_empty() {
        return Ok(None);
    }
    Ok(Some(UploadedImage {
        bytes,
        content_type,
        filename,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, header};
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::images::PLACEHOLDER_IMAGE;

    const BOUNDARY: &str = "test-boundary";

    fn test_router() -> Router {
        let config = Config {
            serpapi_key: None,
            use_serpapi: true,
            huggingface_key: None,
            rag_model: "test-model".to_string(),
        };
        let orchestrator = ProductionOrchestrator::from_config(reqwest::Client::new(), &config);
        create_router(Arc::new(orchestrator))
    }

    fn text_part(name: &str, value: &str) -> Vec<u8> {
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        )
        .into_bytes()
    }

    fn file_part(filename: &str, content_type: &str, bytes: &[u8]) -> Vec<u8> {
        let mut part = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .into_bytes();
        part.extend_from_slice(bytes);
        part.extend_from_slice(b"\r\n");
        part
    }

    fn form_body(parts: &[Vec<u8>]) -> Vec<u8> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(part);
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn multipart_request(uri: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn status_endpoint_reports_ok() {
        let response = test_router()
            .oneshot(Request::builder().uri("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn multimodal_chat_runs_the_degraded_text_pipeline() {
        let body = form_body(&[text_part("text_query", "What are the symptoms of jaundice?")]);
        let response = test_router()
            .oneshot(multipart_request("/multimodal_chat", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;

        assert_eq!(body["mode"], "text_to_text");
        assert_eq!(
            body["answer"],
            "Answer Generation Failed: HUGGINGFACE_API_KEY is missing."
        );
        assert_eq!(body["source_documents"].as_array().unwrap().len(), 3);
        assert_eq!(body["images"], serde_json::json!([]));
        assert_eq!(
            body["message"],
            "Processed text query with web retrieval and grounded generation."
        );

        let words: Vec<&str> = body["ner_results"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["word"].as_str().unwrap())
            .collect();
        assert_eq!(words, vec!["Symptoms", "Jaundice"]);
    }

    #[tokio::test]
    async fn multimodal_chat_rejects_missing_inputs() {
        let body = form_body(&[text_part("mode", "auto")]);
        let response = test_router()
            .oneshot(multipart_request("/multimodal_chat", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["detail"], "Please provide a text query.");
    }

    #[tokio::test]
    async fn multimodal_chat_rejects_unknown_modes() {
        let body = form_body(&[
            text_part("text_query", "fever"),
            text_part("mode", "both"),
        ]);
        let response = test_router()
            .oneshot(multipart_request("/multimodal_chat", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["detail"], "Unknown mode: 'both'.");
    }

    #[tokio::test]
    async fn multimodal_chat_with_upload_resolves_an_image_mode() {
        let body = form_body(&[file_part("rash.png", "image/png", b"img")]);
        let response = test_router()
            .oneshot(multipart_request("/multimodal_chat", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;

        assert_eq!(body["mode"], "image_to_text");
        // Uploaded preview first, placeholder from degraded search second.
        assert_eq!(body["images"][0], "data:image/png;base64,aW1n");
        assert_eq!(body["images"][1], PLACEHOLDER_IMAGE);
        assert_eq!(
            body["answer"],
            "An uploaded medical image (caption unavailable without a vision model)."
        );
        assert_eq!(
            body["message"],
            "Simulated web image retrieval for: rash. Integrate a live search API for real images."
        );
    }

    #[tokio::test]
    async fn multimodal_chat_ignores_empty_file_parts() {
        let body = form_body(&[
            text_part("text_query", "what causes fever"),
            file_part("", "application/octet-stream", b""),
        ]);
        let response = test_router()
            .oneshot(multipart_request("/multimodal_chat", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["mode"], "text_to_text");
    }

    #[tokio::test]
    async fn oversized_uploads_are_rejected_mid_stream() {
        let oversized = vec![0u8; MAX_UPLOAD_BYTES + 1];
        let body = form_body(&[file_part("scan.png", "image/png", &oversized)]);
        let response = test_router()
            .oneshot(multipart_request("/multimodal_chat", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body = json_body(response).await;
        assert_eq!(body["detail"], "Uploaded file exceeds the 10 MiB limit.");
    }

    #[tokio::test]
    async fn legacy_chat_reports_entities_from_the_first_document() {
        let body = form_body(&[text_part("text_query", "how do I recover quickly")]);
        let response = test_router()
            .oneshot(multipart_request("/chat", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;

        assert_eq!(body["status"], "success");
        assert_eq!(body["source_documents"].as_array().unwrap().len(), 3);

        // Placeholder document 1 mentions symptoms, fever, and chills.
        let words: Vec<&str> = body["ner_results"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["word"].as_str().unwrap())
            .collect();
        assert_eq!(words, vec!["Fever", "Chills", "Symptoms"]);
    }

    #[tokio::test]
    async fn legacy_chat_rejects_blank_text() {
        let body = form_body(&[text_part("text_query", "   ")]);
        let response = test_router()
            .oneshot(multipart_request("/chat", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["detail"], "Please provide a text query.");
    }

    #[tokio::test]
    async fn image_search_endpoint_returns_the_placeholder_set() {
        let body = form_body(&[text_part("query", "skin rash")]);
        let response = test_router()
            .oneshot(multipart_request("/search_image_web", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;

        assert_eq!(body["status"], "success");
        assert_eq!(body["results"][0], PLACEHOLDER_IMAGE);
        assert_eq!(
            body["message"],
            "Simulated web image retrieval for: skin rash. Integrate a live search API for real images."
        );
    }

    #[tokio::test]
    async fn image_search_endpoint_requires_a_query() {
        let body = form_body(&[]);
        let response = test_router()
            .oneshot(multipart_request("/search_image_web", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(
            body["detail"],
            "Please provide a text query for the web image search."
        );
    }

    #[tokio::test]
    async fn cross_origin_callers_are_allowed() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/api/status")
                    .header(header::ORIGIN, "http://localhost:5173")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );
    }
}

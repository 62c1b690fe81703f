//! HTTP surface for studydeck.
//!
//! This module exposes a compact Axum router:
//!
//! - `POST /process` – Multipart upload (`file`, optional `summaryCount` or its alias
//!   `flashcardCount`, `documentId`). Runs the full ingestion and returns the result; stores it
//!   when `documentId` is given.
//! - `POST /extract` – Multipart upload (`file`). Runs extraction only; placeholder text is
//!   returned with its warning instead of an error.
//! - `POST /summarize` – JSON `{ "text": ..., "numSummaries": n }`. Summarizes raw text.
//! - `GET /documents/:id` – Fetch a stored ingestion result.
//! - `POST /documents/search` – JSON `{ "query": ..., "limit": n }`. Ranks stored results by
//!   embedding similarity to the query.
//! - `GET /metrics` – Ingestion counters.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State, multipart::MultipartError},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::get_config;
use crate::ingestion::sanitize::{
    is_pdf_mime, sanitize_file_name, sanitize_mime_type, sanitize_string,
};
use crate::ingestion::{
    DecodeMethod, ExtractionDiagnosis, ExtractionStrategy, IngestionApi, IngestionError,
    IngestionResult, ProcessedDocument, RawDocument, SearchError,
};
use crate::metrics::MetricsSnapshot;
use crate::store::{ScoredDocument, StoreError};

/// Room left for multipart framing and the small text fields on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build the HTTP router exposing the ingestion API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: IngestionApi + 'static,
{
    let body_limit = get_config()
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    Router::new()
        .route("/process", post(process_document::<S>))
        .route("/extract", post(extract_document::<S>))
        .route("/summarize", post(summarize_text::<S>))
        .route("/documents/search", post(search_documents::<S>))
        .route("/documents/:id", get(get_document::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(service)
}

/// Fields collected from a multipart upload.
struct UploadForm {
    document: RawDocument,
    summary_count: Option<usize>,
    document_id: Option<String>,
}

/// Read the multipart body, validating the uploaded file.
async fn read_upload(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut file = None;
    let mut summary_count = None;
    let mut document_id = None;
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = sanitize_file_name(field.file_name().map(str::to_string));
                let mime_type = sanitize_mime_type(field.content_type().map(str::to_string));
                let bytes = field.bytes().await?;
                file = Some(RawDocument::new(bytes.to_vec(), mime_type, file_name));
            }
            "summaryCount" | "flashcardCount" => {
                let value = field.text().await?;
                let count = value.trim().parse::<usize>().map_err(|_| {
                    AppError::BadRequest(format!(
                        "{name} must be a positive integer, got '{value}'"
                    ))
                })?;
                summary_count = Some(count);
            }
            "documentId" => {
                document_id = sanitize_string(Some(field.text().await?));
            }
            other => {
                tracing::debug!(field = other, "Ignoring unknown multipart field");
            }
        }
    }

    let Some(document) = file else {
        return Err(AppError::BadRequest("No file uploaded".into()));
    };
    if !is_pdf_mime(&document.mime_type) {
        return Err(AppError::BadRequest(format!(
            "Only PDF files are accepted, got '{}'",
            document.mime_type
        )));
    }
    let max_upload_bytes = get_config().max_upload_bytes;
    if document.size() > max_upload_bytes {
        return Err(AppError::BadRequest(format!(
            "File exceeds the {max_upload_bytes} byte upload limit"
        )));
    }
    Ok(UploadForm {
        document,
        summary_count,
        document_id,
    })
}

/// Ingest an uploaded PDF.
async fn process_document<S>(
    State(service): State<Arc<S>>,
    multipart: Multipart,
) -> Result<Json<ProcessedDocument>, AppError>
where
    S: IngestionApi,
{
    let form = read_upload(multipart).await?;
    let file_name = form.document.file_name.clone();
    let processed = service
        .process(form.document, form.summary_count, form.document_id)
        .await?;
    tracing::info!(
        file = %file_name,
        document_id = ?processed.document_id,
        strategy = %processed.result.strategy_used,
        sections = processed.result.summary_sections.len(),
        "Process request completed"
    );
    Ok(Json(processed))
}

/// Response body for `POST /extract`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExtractResponse {
    text: String,
    page_count: Option<usize>,
    strategy: ExtractionStrategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    diagnosis: Option<ExtractionDiagnosis>,
}

/// Extract text from an uploaded PDF without summarizing it.
async fn extract_document<S>(
    State(service): State<Arc<S>>,
    multipart: Multipart,
) -> Result<Json<ExtractResponse>, AppError>
where
    S: IngestionApi,
{
    let form = read_upload(multipart).await?;
    let extracted = service.extract(form.document).await;
    Ok(Json(ExtractResponse {
        text: extracted.text,
        page_count: extracted.page_count,
        strategy: extracted.strategy,
        warning: extracted.warning,
        diagnosis: extracted.diagnosis,
    }))
}

/// Request body for `POST /summarize`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummarizeRequest {
    /// Text to summarize.
    text: String,
    /// Requested number of sections (clamped to 1..=10).
    #[serde(default)]
    num_summaries: Option<usize>,
}

/// Response body for `POST /summarize`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SummarizeResponse {
    summaries: Vec<String>,
    decode: DecodeMethod,
    chunk_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

/// Summarize caller-provided text.
async fn summarize_text<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<SummarizeRequest>,
) -> Result<Json<SummarizeResponse>, AppError>
where
    S: IngestionApi,
{
    if request.text.trim().is_empty() {
        return Err(AppError::BadRequest("Text is required".into()));
    }
    let outcome = service
        .summarize(request.text, request.num_summaries)
        .await;
    Ok(Json(SummarizeResponse {
        summaries: outcome.sections,
        decode: outcome.decode,
        chunk_count: outcome.chunk_count,
        warning: outcome.degradation.map(|degradation| degradation.to_string()),
    }))
}

/// Return a stored ingestion result.
async fn get_document<S>(
    State(service): State<Arc<S>>,
    Path(document_id): Path<String>,
) -> Result<Json<IngestionResult>, AppError>
where
    S: IngestionApi,
{
    service
        .fetch_document(&document_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No document stored under '{document_id}'")))
}

/// Request body for `POST /documents/search`.
#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    limit: Option<usize>,
}

/// Response body for `POST /documents/search`.
#[derive(Serialize)]
struct SearchResponse {
    results: Vec<ScoredDocument>,
    count: usize,
}

/// Rank stored results by similarity to a free-text query.
async fn search_documents<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError>
where
    S: IngestionApi,
{
    let results = service
        .search_documents(request.query, request.limit)
        .await?;
    Ok(Json(SearchResponse {
        count: results.len(),
        results,
    }))
}

/// Return the current ingestion counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: IngestionApi,
{
    Json(service.metrics_snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "process",
                method: "POST",
                path: "/process",
                description: "Upload a PDF as multipart field `file` (optional `summaryCount`/`flashcardCount`, `documentId`). Returns extracted text prefix, summary sections, embedding and warnings.",
                request_example: None,
            },
            CommandDescriptor {
                name: "extract",
                method: "POST",
                path: "/extract",
                description: "Upload a PDF as multipart field `file` and return its extracted text and strategy.",
                request_example: None,
            },
            CommandDescriptor {
                name: "summarize",
                method: "POST",
                path: "/summarize",
                description: "Summarize raw text into study sections.",
                request_example: Some(json!({
                    "text": "Photosynthesis converts light energy into chemical energy...",
                    "numSummaries": 3
                })),
            },
            CommandDescriptor {
                name: "get_document",
                method: "GET",
                path: "/documents/:id",
                description: "Return the ingestion result stored under a document id.",
                request_example: None,
            },
            CommandDescriptor {
                name: "search_documents",
                method: "POST",
                path: "/documents/search",
                description: "Rank stored results by embedding similarity to a query. Requires an embedding provider.",
                request_example: Some(json!({
                    "query": "How do enzymes lower activation energy?",
                    "limit": 5
                })),
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return ingestion counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

/// Errors mapped onto HTTP responses.
enum AppError {
    BadRequest(String),
    NotFound(String),
    Ingestion(IngestionError),
    Store(StoreError),
    Search(SearchError),
    Multipart(MultipartError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message),
            Self::Ingestion(error) => (StatusCode::BAD_REQUEST, error.to_string()),
            Self::Store(error) => {
                tracing::error!(%error, "Result store request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
            }
            Self::Search(error) => {
                let status = match &error {
                    SearchError::EmptyQuery => StatusCode::BAD_REQUEST,
                    SearchError::EmbeddingsDisabled => StatusCode::SERVICE_UNAVAILABLE,
                    SearchError::Embedding(_) => StatusCode::BAD_GATEWAY,
                    SearchError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    tracing::error!(%error, "Search request failed");
                }
                (status, error.to_string())
            }
            Self::Multipart(error) => (error.status(), error.body_text()),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<IngestionError> for AppError {
    fn from(inner: IngestionError) -> Self {
        Self::Ingestion(inner)
    }
}

impl From<StoreError> for AppError {
    fn from(inner: StoreError) -> Self {
        Self::Store(inner)
    }
}

impl From<SearchError> for AppError {
    fn from(inner: SearchError) -> Self {
        Self::Search(inner)
    }
}

impl From<MultipartError> for AppError {
    fn from(inner: MultipartError) -> Self {
        Self::Multipart(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::{create_router, get_commands};
    use crate::config::{CONFIG, Config, EmbeddingProvider, GenerationProvider};
    use crate::ingestion::{
        DecodeMethod, ExtractedText, ExtractionDiagnosis, ExtractionStrategy, IngestionApi,
        IngestionError, IngestionResult, ProcessedDocument, RawDocument, SearchError,
        SummaryOutcome,
    };
    use crate::metrics::MetricsSnapshot;
    use crate::store::{ScoredDocument, StoreError};
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use serde_json::json;
    use std::sync::{Arc, Once};
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    const BOUNDARY: &str = "studydeck-test-boundary";

    #[tokio::test]
    async fn commands_catalog_exposes_process_endpoint() {
        let response = get_commands().await;
        let commands = response.0.commands;
        let process = commands
            .iter()
            .find(|cmd| cmd.name == "process")
            .expect("process command present");

        assert_eq!(process.method, "POST");
        assert_eq!(process.path, "/process");
        assert!(process.description.contains("multipart"));
        assert!(commands.len() >= 5);
    }

    #[tokio::test]
    async fn process_route_forwards_upload_fields() {
        ensure_test_config();
        let service = Arc::new(StubIngestionService::default());
        let app = create_router(service.clone());

        let body = multipart_body(
            Some(("lecture.pdf", "application/pdf", b"%PDF-1.7 fake")),
            &[("summaryCount", "3"), ("documentId", "doc-7")],
        );
        let response = app
            .oneshot(multipart_request("/process", body))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["documentId"], "doc-7");
        assert_eq!(json["strategyUsed"], "structured");
        assert_eq!(json["summaryDecode"], "strict");
        assert_eq!(json["summarySections"][0], "Section one.");

        let calls = service.calls.lock().await.clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].file_name, "lecture.pdf");
        assert_eq!(calls[0].summary_count, Some(3));
        assert_eq!(calls[0].document_id.as_deref(), Some("doc-7"));
        assert_eq!(calls[0].size, 13);
    }

    #[tokio::test]
    async fn flashcard_count_is_accepted_as_summary_count() {
        ensure_test_config();
        let service = Arc::new(StubIngestionService::default());
        let app = create_router(service.clone());

        let body = multipart_body(
            Some(("lecture.pdf", "application/pdf", b"%PDF-1.7 fake")),
            &[("flashcardCount", "4")],
        );
        let response = app
            .oneshot(multipart_request("/process", body))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let calls = service.calls.lock().await.clone();
        assert_eq!(calls[0].summary_count, Some(4));
    }

    #[tokio::test]
    async fn malformed_flashcard_count_is_rejected_by_name() {
        ensure_test_config();
        let app = create_router(Arc::new(StubIngestionService::default()));

        let body = multipart_body(
            Some(("lecture.pdf", "application/pdf", b"%PDF-1.7 fake")),
            &[("flashcardCount", "many")],
        );
        let response = app
            .oneshot(multipart_request("/process", body))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert!(
            json["error"]
                .as_str()
                .unwrap_or_default()
                .contains("flashcardCount")
        );
    }

    #[tokio::test]
    async fn search_route_returns_ranked_results() {
        ensure_test_config();
        let service = Arc::new(StubIngestionService::default());
        let app = create_router(service.clone());

        let response = app
            .oneshot(json_request(
                "/documents/search",
                json!({ "query": "enzyme kinetics", "limit": 3 }),
            ))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["count"], 1);
        assert_eq!(json["results"][0]["documentId"], "doc-7");
        assert_eq!(json["results"][0]["score"], 0.5);
        assert_eq!(json["results"][0]["summarySections"][0], "Section one.");
        assert_eq!(
            service.searches.lock().await.clone(),
            vec![("enzyme kinetics".to_string(), Some(3))]
        );
    }

    #[tokio::test]
    async fn search_route_maps_disabled_embeddings_to_unavailable() {
        ensure_test_config();
        let service = Arc::new(StubIngestionService {
            search_error: true,
            ..StubIngestionService::default()
        });
        let app = create_router(service);

        let response = app
            .oneshot(json_request("/documents/search", json!({ "query": "enzymes" })))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = json_body(response).await;
        assert!(
            json["error"]
                .as_str()
                .unwrap_or_default()
                .contains("embedding provider")
        );
    }

    #[tokio::test]
    async fn process_route_rejects_non_pdf_uploads() {
        ensure_test_config();
        let service = Arc::new(StubIngestionService::default());
        let app = create_router(service.clone());

        let body = multipart_body(Some(("photo.png", "image/png", b"\x89PNG")), &[]);
        let response = app
            .oneshot(multipart_request("/process", body))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert!(json["error"].as_str().unwrap_or_default().contains("PDF"));
        assert!(service.calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn process_route_requires_a_file() {
        ensure_test_config();
        let app = create_router(Arc::new(StubIngestionService::default()));

        let body = multipart_body(None, &[("summaryCount", "2")]);
        let response = app
            .oneshot(multipart_request("/process", body))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn extraction_failure_maps_to_bad_request() {
        ensure_test_config();
        let service = Arc::new(StubIngestionService {
            fail_extraction: true,
            ..StubIngestionService::default()
        });
        let app = create_router(service);

        let body = multipart_body(Some(("scan.pdf", "application/pdf", b"%PDF")), &[]);
        let response = app
            .oneshot(multipart_request("/process", body))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert!(json["error"].as_str().unwrap_or_default().contains("scan.pdf"));
    }

    #[tokio::test]
    async fn summarize_route_accepts_json() {
        ensure_test_config();
        let app = create_router(Arc::new(StubIngestionService::default()));

        let payload = json!({ "text": "Some lecture text", "numSummaries": 2 });
        let response = app
            .oneshot(json_request("/summarize", payload))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["summaries"], json!(["Summary 1", "Summary 2"]));
        assert_eq!(json["decode"], "strict");
    }

    #[tokio::test]
    async fn missing_document_returns_not_found() {
        ensure_test_config();
        let app = create_router(Arc::new(StubIngestionService::default()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/documents/unknown")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn metrics_route_returns_snapshot() {
        ensure_test_config();
        let app = create_router(Arc::new(StubIngestionService::default()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["documentsIngested"], 4);
    }

    fn multipart_body(file: Option<(&str, &str, &[u8])>, fields: &[(&str, &str)]) -> Vec<u8> {
        let mut body = Vec::new();
        if let Some((name, mime, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\nContent-Type: {mime}\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn multipart_request(uri: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("request")
    }

    fn json_request(uri: &str, payload: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .expect("request")
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&body).expect("json body")
    }

    #[derive(Clone, Debug)]
    struct ProcessCall {
        file_name: String,
        size: usize,
        summary_count: Option<usize>,
        document_id: Option<String>,
    }

    #[derive(Default)]
    struct StubIngestionService {
        calls: Mutex<Vec<ProcessCall>>,
        searches: Mutex<Vec<(String, Option<usize>)>>,
        fail_extraction: bool,
        search_error: bool,
    }

    fn stub_result() -> IngestionResult {
        IngestionResult {
            extracted_text_prefix: "Extracted text".into(),
            summary_sections: vec!["Section one.".into()],
            embedding_vector: None,
            warning: None,
            strategy_used: ExtractionStrategy::Structured,
            page_count: Some(1),
            summary_decode: DecodeMethod::Strict,
            chunk_count: 1,
            text_length: 14,
            document_digest: "abc123".into(),
            processed_at: "2025-01-01T00:00:00Z".into(),
        }
    }

    #[async_trait]
    impl IngestionApi for StubIngestionService {
        async fn process(
            &self,
            document: RawDocument,
            summary_count: Option<usize>,
            document_id: Option<String>,
        ) -> Result<ProcessedDocument, IngestionError> {
            if self.fail_extraction {
                return Err(IngestionError::ExtractionFailure {
                    file_name: document.file_name,
                    diagnosis: Some(ExtractionDiagnosis::NoTextLayer),
                });
            }
            self.calls.lock().await.push(ProcessCall {
                file_name: document.file_name.clone(),
                size: document.size(),
                summary_count,
                document_id: document_id.clone(),
            });
            Ok(ProcessedDocument {
                document_id,
                result: stub_result(),
            })
        }

        async fn extract(&self, document: RawDocument) -> ExtractedText {
            ExtractedText {
                text: format!("text of {}", document.file_name),
                page_count: Some(1),
                strategy: ExtractionStrategy::Structured,
                warning: None,
                diagnosis: None,
            }
        }

        async fn summarize(&self, _text: String, summary_count: Option<usize>) -> SummaryOutcome {
            let count = summary_count.unwrap_or(1);
            SummaryOutcome {
                sections: (1..=count).map(|index| format!("Summary {index}")).collect(),
                decode: DecodeMethod::Strict,
                chunk_count: 1,
                degradation: None,
            }
        }

        async fn fetch_document(
            &self,
            _document_id: &str,
        ) -> Result<Option<IngestionResult>, StoreError> {
            Ok(None)
        }

        async fn search_documents(
            &self,
            query: String,
            limit: Option<usize>,
        ) -> Result<Vec<ScoredDocument>, SearchError> {
            if self.search_error {
                return Err(SearchError::EmbeddingsDisabled);
            }
            self.searches.lock().await.push((query, limit));
            Ok(vec![ScoredDocument {
                document_id: "doc-7".into(),
                score: 0.5,
                result: stub_result(),
            }])
        }

        fn metrics_snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot {
                documents_ingested: 4,
                ..MetricsSnapshot::default()
            }
        }
    }

    fn ensure_test_config() {
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            let _ = CONFIG.set(Config {
                generation_provider: GenerationProvider::Ollama,
                generation_model: "test-model".into(),
                generation_temperature: 0.2,
                openai_api_key: None,
                openai_base_url: "http://127.0.0.1:9".into(),
                ollama_url: "http://127.0.0.1:11434".into(),
                embedding_provider: EmbeddingProvider::None,
                embedding_model: "test-embedding".into(),
                embedding_dimension: 8,
                summary_count: 5,
                summary_input_char_limit: 12_000,
                text_splitter_chunk_size: 4000,
                text_splitter_chunk_overlap: 200,
                embedding_prefix_chars: 8_000,
                stored_text_prefix_chars: 10_000,
                max_upload_bytes: 1024,
                result_store_capacity: 100,
                server_port: None,
            });
        });
    }
}

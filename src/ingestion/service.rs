//! Ingestion service shared by the HTTP and CLI surfaces.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::{
    config::Config,
    embedding::{EmbeddingClientError, get_embedding_client},
    generation::{GenerationClientError, get_generation_client},
    ingestion::{
        extract::TextExtractor,
        pipeline::{IngestionPipeline, PipelineOptions},
        sanitize::sanitize_string,
        summarize::{Summarizer, SummarizerOptions},
        types::{ExtractedText, IngestionError, IngestionResult, RawDocument, SummaryOutcome},
    },
    metrics::{IngestionMetrics, MetricsSnapshot},
    store::{InMemoryResultStore, ResultStore, ScoredDocument, StoreError},
};

/// Matches returned by a search that does not ask for a specific count.
pub const DEFAULT_SEARCH_LIMIT: usize = 5;
/// Upper bound on matches returned by one search.
pub const MAX_SEARCH_LIMIT: usize = 50;

/// Errors raised while wiring the service from configuration.
#[derive(Debug, Error)]
pub enum ServiceInitError {
    /// The generation backend could not be constructed.
    #[error("Failed to initialize generation client: {0}")]
    Generation(#[from] GenerationClientError),
    /// The embedding backend could not be constructed.
    #[error("Failed to initialize embedding client: {0}")]
    Embedding(#[from] EmbeddingClientError),
}

/// Errors raised by similarity search over stored results.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The query contained no text.
    #[error("Search query is empty")]
    EmptyQuery,
    /// No embedding provider is configured, so queries cannot be embedded.
    #[error("Search requires an embedding provider (EMBEDDING_PROVIDER is none)")]
    EmbeddingsDisabled,
    /// The provider failed to embed the query.
    #[error("Failed to embed search query: {0}")]
    Embedding(String),
    /// The result store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Ingestion result together with the key it was stored under, if any.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedDocument {
    /// Caller-supplied identifier; results are stored only when one is given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    /// Result of the ingestion.
    #[serde(flatten)]
    pub result: IngestionResult,
}

/// Abstraction over the ingestion service used by external surfaces.
#[async_trait]
pub trait IngestionApi: Send + Sync {
    /// Run the full pipeline, storing the result when `document_id` is given.
    async fn process(
        &self,
        document: RawDocument,
        summary_count: Option<usize>,
        document_id: Option<String>,
    ) -> Result<ProcessedDocument, IngestionError>;

    /// Run extraction only.
    async fn extract(&self, document: RawDocument) -> ExtractedText;

    /// Summarize caller-provided text.
    async fn summarize(&self, text: String, summary_count: Option<usize>) -> SummaryOutcome;

    /// Look up a stored result.
    async fn fetch_document(&self, document_id: &str)
    -> Result<Option<IngestionResult>, StoreError>;

    /// Rank stored results by similarity to `query`.
    ///
    /// `limit` defaults to [`DEFAULT_SEARCH_LIMIT`] and is clamped to `1..=MAX_SEARCH_LIMIT`.
    async fn search_documents(
        &self,
        query: String,
        limit: Option<usize>,
    ) -> Result<Vec<ScoredDocument>, SearchError>;

    /// Retrieve the current metrics snapshot.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Owns the pipeline, the result store and the metrics registry.
///
/// Construct once near process start and share through an `Arc`.
pub struct IngestionService {
    pipeline: IngestionPipeline,
    store: Arc<dyn ResultStore>,
    metrics: Arc<IngestionMetrics>,
}

impl IngestionService {
    /// Wire the service from configuration, using `lopdf` and an in-memory store.
    pub fn from_config(config: &Config) -> Result<Self, ServiceInitError> {
        tracing::info!(provider = ?config.generation_provider, model = %config.generation_model, "Initializing generation client");
        let generator = get_generation_client(config)?;
        tracing::info!(provider = ?config.embedding_provider, model = %config.embedding_model, "Initializing embedding client");
        let embedder = get_embedding_client(config)?;

        let summarizer = Summarizer::new(
            generator,
            SummarizerOptions {
                model: config.generation_model.clone(),
                temperature: config.generation_temperature,
                input_char_limit: config.summary_input_char_limit,
                chunk_size: config.text_splitter_chunk_size,
                chunk_overlap: config.text_splitter_chunk_overlap,
            },
        );
        let pipeline = IngestionPipeline::new(
            TextExtractor::with_lopdf(),
            summarizer,
            embedder,
            PipelineOptions {
                default_summary_count: config.summary_count,
                embedding_prefix_chars: config.embedding_prefix_chars,
                stored_text_prefix_chars: config.stored_text_prefix_chars,
                embedding_dimension: config.embedding_dimension,
            },
        );
        let store = InMemoryResultStore::with_capacity(config.result_store_capacity);
        Ok(Self::from_parts(pipeline, Arc::new(store)))
    }

    /// Build a service from an existing pipeline and store.
    pub fn from_parts(pipeline: IngestionPipeline, store: Arc<dyn ResultStore>) -> Self {
        Self {
            pipeline,
            store,
            metrics: Arc::new(IngestionMetrics::new()),
        }
    }
}

#[async_trait]
impl IngestionApi for IngestionService {
    async fn process(
        &self,
        document: RawDocument,
        summary_count: Option<usize>,
        document_id: Option<String>,
    ) -> Result<ProcessedDocument, IngestionError> {
        let result = match self.pipeline.ingest(document, summary_count).await {
            Ok(result) => result,
            Err(error) => {
                self.metrics.record_extraction_failure();
                return Err(error);
            }
        };
        self.metrics.record_ingestion(&result);

        let document_id = sanitize_string(document_id);
        if let Some(id) = &document_id {
            match self.store.put(id, result.clone()).await {
                Ok(()) => tracing::debug!(document_id = %id, "Stored ingestion result"),
                Err(error) => {
                    tracing::error!(document_id = %id, %error, "Failed to store ingestion result");
                }
            }
        }
        Ok(ProcessedDocument {
            document_id,
            result,
        })
    }

    async fn extract(&self, document: RawDocument) -> ExtractedText {
        self.pipeline.extract(document).await
    }

    async fn summarize(&self, text: String, summary_count: Option<usize>) -> SummaryOutcome {
        self.pipeline.summarize(&text, summary_count).await
    }

    async fn fetch_document(
        &self,
        document_id: &str,
    ) -> Result<Option<IngestionResult>, StoreError> {
        self.store.get(document_id).await
    }

    async fn search_documents(
        &self,
        query: String,
        limit: Option<usize>,
    ) -> Result<Vec<ScoredDocument>, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        let limit = limit
            .unwrap_or(DEFAULT_SEARCH_LIMIT)
            .clamp(1, MAX_SEARCH_LIMIT);

        let vector = match self.pipeline.embed(query).await {
            Ok(Some(vector)) => vector,
            Ok(None) => return Err(SearchError::EmbeddingsDisabled),
            Err(degradation) => {
                tracing::warn!(%degradation, "Search query could not be embedded");
                return Err(SearchError::Embedding(degradation.to_string()));
            }
        };
        let matches = self.store.search(&vector, limit).await?;
        tracing::debug!(limit, matches = matches.len(), "Searched stored results");
        Ok(matches)
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

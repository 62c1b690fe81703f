//! End-to-end ingestion: extract, summarize, embed, assemble.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::embedding::EmbeddingClient;

use super::extract::{self, TextExtractor};
use super::sanitize::sanitize_summary_count;
use super::summarize::Summarizer;
use super::types::{
    Degradation, ExtractedText, ExtractionDiagnosis, IngestionError, IngestionResult,
    RawDocument, SummaryOutcome,
};

/// Pipeline limits applied around the extract, summarize and embed stages.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Section count used when the caller does not ask for one.
    pub default_summary_count: usize,
    /// Leading characters of text sent for embedding.
    pub embedding_prefix_chars: usize,
    /// Leading characters of text kept in the result.
    pub stored_text_prefix_chars: usize,
    /// Length every embedding vector must have.
    pub embedding_dimension: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            default_summary_count: 5,
            embedding_prefix_chars: 8_000,
            stored_text_prefix_chars: 10_000,
            embedding_dimension: 1536,
        }
    }
}

/// Orchestrates one document through every stage.
///
/// Stages depend only on the injected parser, generation client and embedding client, so any
/// of them can be replaced in tests.
#[derive(Clone)]
pub struct IngestionPipeline {
    extractor: TextExtractor,
    summarizer: Summarizer,
    embedder: Option<Arc<dyn EmbeddingClient>>,
    options: PipelineOptions,
}

impl IngestionPipeline {
    /// Assemble a pipeline from its stages.
    pub fn new(
        extractor: TextExtractor,
        summarizer: Summarizer,
        embedder: Option<Arc<dyn EmbeddingClient>>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            extractor,
            summarizer,
            embedder,
            options,
        }
    }

    /// Run extraction on the blocking pool.
    ///
    /// A panic inside the parser is reported as an unreadable document.
    pub async fn extract(&self, document: RawDocument) -> ExtractedText {
        let extractor = self.extractor.clone();
        let file_name = document.file_name.clone();
        let size = document.size();
        match tokio::task::spawn_blocking(move || extractor.extract(&document)).await {
            Ok(extracted) => extracted,
            Err(error) => {
                tracing::error!(file = %file_name, %error, "Extraction task aborted");
                extract::placeholder(&file_name, size, ExtractionDiagnosis::Unreadable)
            }
        }
    }

    /// Summarize arbitrary text; `target` is clamped to the supported range.
    pub async fn summarize(&self, text: &str, target: Option<usize>) -> SummaryOutcome {
        let target = sanitize_summary_count(target, self.options.default_summary_count);
        self.summarizer.summarize(text, target).await
    }

    /// Ingest one document.
    ///
    /// Fails only when no real text could be extracted. Summarization and embedding problems
    /// degrade the result and are reported through its warning.
    pub async fn ingest(
        &self,
        document: RawDocument,
        target: Option<usize>,
    ) -> Result<IngestionResult, IngestionError> {
        let file_name = document.file_name.clone();
        let document_digest = digest(&document.bytes);
        tracing::info!(file = %file_name, size = document.size(), "Ingesting document");

        let extracted = self.extract(document).await;
        if extracted.is_placeholder() || extracted.text.trim().is_empty() {
            tracing::warn!(file = %file_name, diagnosis = ?extracted.diagnosis, "Rejecting document without extractable text");
            return Err(IngestionError::ExtractionFailure {
                file_name,
                diagnosis: extracted.diagnosis,
            });
        }

        let mut degradations = Vec::new();
        if let Some(warning) = &extracted.warning {
            degradations.push(Degradation::FallbackExtraction {
                strategy: extracted.strategy,
                warning: warning.clone(),
            });
        }

        let summary = self.summarize(&extracted.text, target).await;
        if let Some(degradation) = summary.degradation.clone() {
            degradations.push(degradation);
        }

        let embedding_vector = match self.embed(&extracted.text).await {
            Ok(vector) => vector,
            Err(degradation) => {
                tracing::warn!(file = %file_name, %degradation, "Continuing without embedding");
                degradations.push(degradation);
                None
            }
        };

        let warning = (!degradations.is_empty()).then(|| {
            degradations
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ")
        });

        let result = IngestionResult {
            extracted_text_prefix: prefix(&extracted.text, self.options.stored_text_prefix_chars)
                .to_string(),
            summary_sections: summary.sections,
            embedding_vector,
            warning,
            strategy_used: extracted.strategy,
            page_count: extracted.page_count,
            summary_decode: summary.decode,
            chunk_count: summary.chunk_count,
            text_length: extracted.text.chars().count(),
            document_digest,
            processed_at: current_timestamp_rfc3339(),
        };
        tracing::info!(
            file = %file_name,
            strategy = %result.strategy_used,
            decode = %result.summary_decode,
            sections = result.summary_sections.len(),
            embedded = result.embedding_vector.is_some(),
            "Ingestion complete"
        );
        Ok(result)
    }

    /// Embed the leading characters of `text`.
    ///
    /// Returns `Ok(None)` when embeddings are disabled. Vectors of the wrong dimension are
    /// rejected the same way a provider failure is.
    pub async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>, Degradation> {
        let Some(embedder) = &self.embedder else {
            return Ok(None);
        };
        let input = prefix(text, self.options.embedding_prefix_chars).to_string();
        let vectors = embedder
            .generate_embeddings(vec![input])
            .await
            .map_err(|error| Degradation::EmbeddingUnavailable(error.to_string()))?;
        let vector = vectors.into_iter().next().ok_or_else(|| {
            Degradation::EmbeddingUnavailable("provider returned no vectors".to_string())
        })?;
        if vector.len() != self.options.embedding_dimension {
            return Err(Degradation::EmbeddingUnavailable(format!(
                "expected {} dimensions, got {}",
                self.options.embedding_dimension,
                vector.len()
            )));
        }
        Ok(Some(vector))
    }
}

/// Leading `limit` characters of `text`.
fn prefix(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => &text[..cut],
        None => text,
    }
}

/// Hex-encoded SHA-256 of the uploaded bytes.
pub fn digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

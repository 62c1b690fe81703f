use std::sync::atomic::{AtomicU64, Ordering};

use crate::ingestion::{DecodeMethod, ExtractionStrategy, IngestionResult};

/// Thread-safe counters describing ingestion activity.
#[derive(Default)]
pub struct IngestionMetrics {
    documents_ingested: AtomicU64,
    extraction_failures: AtomicU64,
    fallback_extractions: AtomicU64,
    degraded_decodes: AtomicU64,
    summary_fallbacks: AtomicU64,
    missing_embeddings: AtomicU64,
    chunks_processed: AtomicU64,
}

impl IngestionMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed ingestion and the degradations it went through.
    pub fn record_ingestion(&self, result: &IngestionResult) {
        self.documents_ingested.fetch_add(1, Ordering::Relaxed);
        self.chunks_processed
            .fetch_add(result.chunk_count as u64, Ordering::Relaxed);
        if result.strategy_used != ExtractionStrategy::Structured {
            self.fallback_extractions.fetch_add(1, Ordering::Relaxed);
        }
        match result.summary_decode {
            DecodeMethod::Strict => {}
            DecodeMethod::AbsoluteFallback => {
                self.summary_fallbacks.fetch_add(1, Ordering::Relaxed);
            }
            _ => {
                self.degraded_decodes.fetch_add(1, Ordering::Relaxed);
            }
        }
        if result.embedding_vector.is_none() {
            self.missing_embeddings.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record an ingestion rejected because no usable text could be extracted.
    pub fn record_extraction_failure(&self) {
        self.extraction_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_ingested: self.documents_ingested.load(Ordering::Relaxed),
            extraction_failures: self.extraction_failures.load(Ordering::Relaxed),
            fallback_extractions: self.fallback_extractions.load(Ordering::Relaxed),
            degraded_decodes: self.degraded_decodes.load(Ordering::Relaxed),
            summary_fallbacks: self.summary_fallbacks.load(Ordering::Relaxed),
            missing_embeddings: self.missing_embeddings.load(Ordering::Relaxed),
            chunks_processed: self.chunks_processed.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of ingestion counters used for reporting.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Documents that produced an ingestion result since startup.
    pub documents_ingested: u64,
    /// Uploads rejected because extraction yielded nothing usable.
    pub extraction_failures: u64,
    /// Results whose text came from a fallback extraction strategy.
    pub fallback_extractions: u64,
    /// Results whose summaries needed a non-strict decode.
    pub degraded_decodes: u64,
    /// Results carrying the fixed "no summary" message.
    pub summary_fallbacks: u64,
    /// Results stored without an embedding vector.
    pub missing_embeddings: u64,
    /// Total chunk count produced across all summarized documents.
    pub chunks_processed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(
        strategy: ExtractionStrategy,
        decode: DecodeMethod,
        embedded: bool,
        chunk_count: usize,
    ) -> IngestionResult {
        IngestionResult {
            extracted_text_prefix: "text".into(),
            summary_sections: vec!["summary".into()],
            embedding_vector: embedded.then(|| vec![0.5; 4]),
            warning: None,
            strategy_used: strategy,
            page_count: Some(1),
            summary_decode: decode,
            chunk_count,
            text_length: 4,
            document_digest: "digest".into(),
            processed_at: "2025-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn records_ingestions_and_degradations() {
        let metrics = IngestionMetrics::new();
        metrics.record_ingestion(&result(
            ExtractionStrategy::Structured,
            DecodeMethod::Strict,
            true,
            2,
        ));
        metrics.record_ingestion(&result(
            ExtractionStrategy::NaiveReparse,
            DecodeMethod::FencedBlock,
            false,
            3,
        ));
        metrics.record_ingestion(&result(
            ExtractionStrategy::Structured,
            DecodeMethod::AbsoluteFallback,
            true,
            1,
        ));
        metrics.record_extraction_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.documents_ingested, 3);
        assert_eq!(snapshot.chunks_processed, 6);
        assert_eq!(snapshot.fallback_extractions, 1);
        assert_eq!(snapshot.degraded_decodes, 1);
        assert_eq!(snapshot.summary_fallbacks, 1);
        assert_eq!(snapshot.missing_embeddings, 1);
        assert_eq!(snapshot.extraction_failures, 1);
    }

    #[test]
    fn snapshot_starts_at_zero() {
        let snapshot = IngestionMetrics::new().snapshot();
        assert_eq!(snapshot.documents_ingested, 0);
        assert_eq!(snapshot.chunks_processed, 0);
    }
}

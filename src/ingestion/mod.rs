//! Document ingestion: extraction, chunking, summarization and orchestration.

pub mod chunking;
pub mod extract;
pub mod pipeline;
pub mod sanitize;
mod service;
pub mod summarize;
pub mod types;

pub use extract::{LopdfParser, PdfParser, TextExtractor};
pub use pipeline::{IngestionPipeline, PipelineOptions};
pub use service::{
    DEFAULT_SEARCH_LIMIT, IngestionApi, IngestionService, MAX_SEARCH_LIMIT, ProcessedDocument,
    SearchError, ServiceInitError,
};
pub use summarize::{Summarizer, SummarizerOptions};
pub use types::{
    ChunkingError, DecodeMethod, Degradation, ExtractedText, ExtractionDiagnosis,
    ExtractionStrategy, IngestionError, IngestionResult, RawDocument, SummaryOutcome,
};

//! Core data types and error definitions for the ingestion pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while splitting extracted text into chunks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkingError {
    /// Caller configured an impossible window.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
}

/// Uploaded file as received from a caller.
#[derive(Debug, Clone)]
pub struct RawDocument {
    /// Raw file contents.
    pub bytes: Vec<u8>,
    /// MIME type declared by the uploader.
    pub mime_type: String,
    /// Original file name, used in diagnostics and placeholder text.
    pub file_name: String,
}

impl RawDocument {
    /// Wrap uploaded bytes together with their declared metadata.
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
            file_name: file_name.into(),
        }
    }

    /// Size of the upload in bytes.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Strategy that produced an [`ExtractedText`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionStrategy {
    /// Positioned fragments grouped into lines and pages.
    Structured,
    /// Fragments joined with single spaces, ignoring position.
    NaiveReparse,
    /// Printable bytes recovered from raw content streams.
    FallbackScan,
    /// Synthetic text describing an unreadable file.
    Placeholder,
}

impl ExtractionStrategy {
    /// Stable identifier used in logs and serialized results.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Structured => "structured",
            Self::NaiveReparse => "naive-reparse",
            Self::FallbackScan => "fallback-scan",
            Self::Placeholder => "placeholder",
        }
    }
}

impl fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why extraction could not recover meaningful text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionDiagnosis {
    /// The upload contained no bytes.
    EmptyInput,
    /// The container could not be parsed at all.
    Unreadable,
    /// The container parsed but carried no usable text layer (scanned or image-only pages).
    NoTextLayer,
}

impl fmt::Display for ExtractionDiagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::EmptyInput => "the file is empty",
            Self::Unreadable => "the file could not be parsed as a PDF",
            Self::NoTextLayer => "the file has no selectable text layer",
        })
    }
}

/// Text recovered from a document together with how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedText {
    /// Extracted text. Never empty; the placeholder strategy fills in when nothing else works.
    pub text: String,
    /// Page count, when the container could be parsed.
    pub page_count: Option<usize>,
    /// Strategy that produced `text`.
    pub strategy: ExtractionStrategy,
    /// User-facing note attached whenever a fallback strategy was used.
    pub warning: Option<String>,
    /// Diagnosis recorded when earlier strategies failed.
    pub diagnosis: Option<ExtractionDiagnosis>,
}

impl ExtractedText {
    /// Whether the text is synthetic rather than recovered from the file.
    pub fn is_placeholder(&self) -> bool {
        self.strategy == ExtractionStrategy::Placeholder
    }
}

/// Decoder that produced a list of summary sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecodeMethod {
    /// The reply was a JSON object with a `summaries` array.
    Strict,
    /// The JSON object sat inside a fenced code block.
    FencedBlock,
    /// A single joined `summaries` string was split back into sections.
    Resplit,
    /// Sections were cut at enumerated markers.
    NumberedSections,
    /// Sections were taken from blank-line separated paragraphs.
    Paragraphs,
    /// Nothing usable was recovered; a fixed message stands in.
    AbsoluteFallback,
}

impl DecodeMethod {
    /// Stable identifier used in logs and serialized results.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::FencedBlock => "fenced-block",
            Self::Resplit => "resplit",
            Self::NumberedSections => "numbered-sections",
            Self::Paragraphs => "paragraphs",
            Self::AbsoluteFallback => "absolute-fallback",
        }
    }
}

impl fmt::Display for DecodeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary sections produced for one document.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryOutcome {
    /// Ordered sections, at most the requested count and never empty.
    pub sections: Vec<String>,
    /// Decoder that recovered the sections.
    pub decode: DecodeMethod,
    /// Number of chunks the text splitter produced for the input.
    pub chunk_count: usize,
    /// Degradation encountered while summarizing, if any.
    pub degradation: Option<Degradation>,
}

/// Non-fatal problems surfaced to callers through the result warning.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Degradation {
    /// Text came from a fallback extraction strategy.
    #[error("{warning}")]
    FallbackExtraction {
        /// Strategy that produced the text.
        strategy: ExtractionStrategy,
        /// Warning attached by the extractor.
        warning: String,
    },
    /// Summary sections were recovered by a lenient decoder.
    #[error("Summaries were recovered from loosely formatted output ({0}).")]
    DecodeDegraded(DecodeMethod),
    /// The generation backend failed; the fixed fallback message was used.
    #[error("Summary generation unavailable: {0}")]
    GenerationUnavailable(String),
    /// No embedding vector could be produced.
    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),
}

/// Final record produced for a successfully ingested document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionResult {
    /// Leading slice of the extracted text.
    pub extracted_text_prefix: String,
    /// Ordered, non-empty summary sections.
    pub summary_sections: Vec<String>,
    /// Embedding of the text prefix, absent when embedding failed or is disabled.
    pub embedding_vector: Option<Vec<f32>>,
    /// Degradations joined into one user-facing note.
    pub warning: Option<String>,
    /// Extraction strategy that produced the text.
    pub strategy_used: ExtractionStrategy,
    /// Page count reported by the parser.
    pub page_count: Option<usize>,
    /// Decoder that recovered the summary sections.
    pub summary_decode: DecodeMethod,
    /// Number of chunks the text splitter produced.
    pub chunk_count: usize,
    /// Length of the full extracted text, in characters.
    pub text_length: usize,
    /// Hex-encoded SHA-256 of the uploaded bytes.
    pub document_digest: String,
    /// RFC3339 timestamp recorded when processing finished.
    pub processed_at: String,
}

/// Errors that abort an ingestion.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// No real text could be recovered from the upload.
    #[error(
        "Could not extract text from \"{file_name}\". The file might be scanned or protected; try a PDF with selectable text."
    )]
    ExtractionFailure {
        /// Name of the rejected file.
        file_name: String,
        /// Diagnosis recorded by the extractor, if any.
        diagnosis: Option<ExtractionDiagnosis>,
    },
}

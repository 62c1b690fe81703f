//! Layout-aware text extraction with an ordered fallback cascade.
//!
//! Strategies, tried in order until one yields meaningful text:
//!
//! 1. structured: positioned fragments grouped into lines and pages by [`layout`];
//! 2. naive: the same fragments joined with single spaces;
//! 3. byte scan: printable bytes after raw `stream` markers ([`scan`]), attempted only when the
//!    bytes carry a `%PDF-` header;
//! 4. placeholder: synthetic text naming the file, never empty.
//!
//! Fallback results always carry a warning. The parser sits behind [`PdfParser`] so tests and
//! alternative backends can supply fragments directly.

pub mod layout;
pub mod lopdf_parser;
pub mod scan;

use std::sync::Arc;

use thiserror::Error;

use super::types::{ExtractedText, ExtractionDiagnosis, ExtractionStrategy, RawDocument};

pub use lopdf_parser::LopdfParser;

/// Minimum trimmed length, in characters, for a strategy's output to be accepted.
pub const MIN_MEANINGFUL_CHARS: usize = 100;

pub(crate) const NAIVE_WARNING: &str =
    "Used fallback extraction method. Results may be incomplete.";
pub(crate) const SCAN_WARNING: &str =
    "Recovered text by scanning raw PDF streams. Formatting is lost and results may be noisy.";
pub(crate) const PLACEHOLDER_WARNING: &str =
    "PDF extraction encountered issues, using placeholder text";

/// A run of text with its position on the page.
///
/// `y` grows downward from the top edge of the page, so smaller values read first.
#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    /// Decoded text of the run.
    pub text: String,
    /// Horizontal offset from the left edge.
    pub x: f32,
    /// Vertical offset from the top edge.
    pub y: f32,
    /// Estimated rendered width.
    pub width: f32,
}

/// Fragments of one page in content-stream order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PdfPage {
    /// Positioned text runs.
    pub fragments: Vec<TextFragment>,
}

/// Errors raised by a [`PdfParser`].
#[derive(Debug, Error)]
pub enum PdfParseError {
    /// There were no bytes to parse.
    #[error("document is empty")]
    Empty,
    /// The container structure could not be read.
    #[error("failed to read PDF container: {0}")]
    Container(String),
}

/// Source of positioned text fragments for a PDF.
pub trait PdfParser: Send + Sync {
    /// Parse every page of the document.
    fn parse(&self, bytes: &[u8]) -> Result<Vec<PdfPage>, PdfParseError>;
}

/// Runs the extraction cascade over a [`PdfParser`].
#[derive(Clone)]
pub struct TextExtractor {
    parser: Arc<dyn PdfParser>,
}

impl TextExtractor {
    /// Build an extractor over the supplied parser.
    pub fn new(parser: Arc<dyn PdfParser>) -> Self {
        Self { parser }
    }

    /// Build an extractor backed by [`LopdfParser`].
    pub fn with_lopdf() -> Self {
        Self::new(Arc::new(LopdfParser))
    }

    /// Extract text from `document`. Never fails; see [`ExtractedText::is_placeholder`].
    pub fn extract(&self, document: &RawDocument) -> ExtractedText {
        if document.bytes.is_empty() {
            tracing::warn!(file = %document.file_name, "Uploaded document is empty");
            return placeholder(
                &document.file_name,
                document.size(),
                ExtractionDiagnosis::EmptyInput,
            );
        }

        let mut diagnosis = ExtractionDiagnosis::Unreadable;
        match self.parser.parse(&document.bytes) {
            Ok(pages) => {
                diagnosis = ExtractionDiagnosis::NoTextLayer;
                let page_count = Some(pages.len());
                match layout::reconstruct_document(&pages) {
                    Ok(text) if is_meaningful(&text) => {
                        tracing::debug!(
                            file = %document.file_name,
                            pages = pages.len(),
                            chars = text.chars().count(),
                            "Structured extraction succeeded"
                        );
                        return ExtractedText {
                            text,
                            page_count,
                            strategy: ExtractionStrategy::Structured,
                            warning: None,
                            diagnosis: None,
                        };
                    }
                    Ok(_) => {
                        tracing::debug!(file = %document.file_name, "Structured extraction yielded too little text");
                    }
                    Err(error) => {
                        tracing::warn!(file = %document.file_name, %error, "Layout reconstruction failed");
                    }
                }

                let text = layout::join_fragments(&pages);
                if is_meaningful(&text) {
                    tracing::info!(file = %document.file_name, "Using naive fragment join");
                    return ExtractedText {
                        text,
                        page_count,
                        strategy: ExtractionStrategy::NaiveReparse,
                        warning: Some(NAIVE_WARNING.to_string()),
                        diagnosis: Some(diagnosis),
                    };
                }
            }
            Err(error) => {
                tracing::warn!(file = %document.file_name, %error, "PDF parse failed");
            }
        }

        if scan::has_pdf_header(&document.bytes) {
            let text = scan::scan_stream_text(&document.bytes);
            if is_meaningful(&text) {
                tracing::info!(file = %document.file_name, "Using raw stream scan");
                return ExtractedText {
                    text,
                    page_count: None,
                    strategy: ExtractionStrategy::FallbackScan,
                    warning: Some(SCAN_WARNING.to_string()),
                    diagnosis: Some(diagnosis),
                };
            }
        } else {
            tracing::debug!(file = %document.file_name, "No PDF header; skipping raw stream scan");
        }

        tracing::warn!(file = %document.file_name, ?diagnosis, "All extraction strategies failed");
        placeholder(&document.file_name, document.size(), diagnosis)
    }
}

/// Synthetic result for a file with no recoverable text.
pub fn placeholder(file_name: &str, size: usize, diagnosis: ExtractionDiagnosis) -> ExtractedText {
    let text = format!(
        "This text was extracted from \"{file_name}\" ({size} bytes).\n\n\
         The PDF content would appear here, but no readable text could be recovered: {diagnosis}.\n\n\
         For best results, upload a PDF with selectable text rather than scanned images."
    );
    ExtractedText {
        text,
        page_count: None,
        strategy: ExtractionStrategy::Placeholder,
        warning: Some(PLACEHOLDER_WARNING.to_string()),
        diagnosis: Some(diagnosis),
    }
}

fn is_meaningful(text: &str) -> bool {
    text.trim().chars().count() >= MIN_MEANINGFUL_CHARS
}

//! Section summaries for extracted document text.

pub mod decode;
mod prompt;

use std::sync::Arc;

use crate::generation::{GenerationClient, GenerationRequest};

use super::chunking::chunk_text;
use super::types::{DecodeMethod, Degradation, SummaryOutcome};

pub use decode::NO_SUMMARY_MESSAGE;

/// Tunables for [`Summarizer`].
#[derive(Debug, Clone)]
pub struct SummarizerOptions {
    /// Model identifier sent with every request.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Characters of text included in the prompt.
    pub input_char_limit: usize,
    /// Text splitter window, in characters.
    pub chunk_size: usize,
    /// Text splitter overlap, in characters.
    pub chunk_overlap: usize,
}

impl Default for SummarizerOptions {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            temperature: 0.2,
            input_char_limit: 12_000,
            chunk_size: super::chunking::DEFAULT_CHUNK_SIZE,
            chunk_overlap: super::chunking::DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Turns document text into a fixed number of study sections.
#[derive(Clone)]
pub struct Summarizer {
    client: Arc<dyn GenerationClient>,
    options: SummarizerOptions,
}

impl Summarizer {
    /// Build a summarizer over a generation backend.
    pub fn new(client: Arc<dyn GenerationClient>, options: SummarizerOptions) -> Self {
        Self { client, options }
    }

    /// Summarize `text` into at most `target` sections.
    ///
    /// Never fails: backend errors and unparseable replies produce the fixed fallback message
    /// and a [`Degradation`].
    pub async fn summarize(&self, text: &str, target: usize) -> SummaryOutcome {
        let target = target.max(1);
        let chunk_count = match chunk_text(text, self.options.chunk_size, self.options.chunk_overlap)
        {
            Ok(chunks) => chunks.len(),
            Err(error) => {
                tracing::warn!(%error, "Text splitter rejected configuration");
                0
            }
        };

        let excerpt = prompt::truncate_for_prompt(text, self.options.input_char_limit);
        let request = GenerationRequest {
            model: self.options.model.clone(),
            prompt: prompt::build_summary_prompt(&excerpt, target),
            temperature: self.options.temperature,
        };
        tracing::debug!(
            model = %request.model,
            target,
            chunk_count,
            prompt_chars = request.prompt.chars().count(),
            "Requesting summary sections"
        );

        let content = match self.client.generate(request).await {
            Ok(content) => content,
            Err(error) => {
                tracing::warn!(%error, "Summary generation failed");
                let fallback = decode::absolute_fallback();
                return SummaryOutcome {
                    sections: fallback.sections,
                    decode: fallback.method,
                    chunk_count,
                    degradation: Some(Degradation::GenerationUnavailable(error.to_string())),
                };
            }
        };

        let decoded = decode::decode_sections(&content, target);
        let degradation = match decoded.method {
            DecodeMethod::Strict => None,
            DecodeMethod::AbsoluteFallback => Some(Degradation::GenerationUnavailable(
                "the model reply contained no usable summary".to_string(),
            )),
            method => Some(Degradation::DecodeDegraded(method)),
        };
        if let Some(degradation) = &degradation {
            tracing::info!(method = %decoded.method, %degradation, "Summary decode degraded");
        }
        if decoded.sections.len() < target && decoded.method != DecodeMethod::AbsoluteFallback {
            tracing::debug!(
                requested = target,
                produced = decoded.sections.len(),
                "Model returned fewer sections than requested"
            );
        }

        SummaryOutcome {
            sections: decoded.sections,
            decode: decoded.method,
            chunk_count,
            degradation,
        }
    }
}

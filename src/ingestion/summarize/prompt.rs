//! Prompt construction for section summaries.

use std::borrow::Cow;

/// Appended to text cut at the input character limit.
pub(crate) const TRUNCATION_MARKER: &str = "...";

/// Cut `text` to at most `limit` characters, marking the cut.
pub(crate) fn truncate_for_prompt(text: &str, limit: usize) -> Cow<'_, str> {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => Cow::Owned(format!("{}{TRUNCATION_MARKER}", &text[..cut])),
        None => Cow::Borrowed(text),
    }
}

/// Build the single request sent to the generation backend.
pub(crate) fn build_summary_prompt(text: &str, target: usize) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!(
        "You write study notes. Summarize the document below into exactly {target} sections.\n\n"
    ));
    prompt.push_str("Rules for every section:\n");
    prompt.push_str("- Cover one distinct topic or concept from the document.\n");
    prompt.push_str("- Open with a clear topic sentence.\n");
    prompt.push_str("- Use 100 to 150 words.\n");
    prompt.push_str("- Stay factual and rely only on the document.\n\n");
    prompt.push_str(&format!(
        "Respond with a single JSON object and nothing else, shaped like:\n\
         {{\"summaries\": [\"section 1\", \"section 2\", ...]}}\n\
         The \"summaries\" array must contain exactly {target} strings.\n\n"
    ));
    prompt.push_str("Document:\n");
    prompt.push_str(text);
    prompt.push('\n');
    prompt
}

//! Helpers for normalizing caller input and model output.

/// Bounds applied to the requested number of summary sections.
pub const MIN_SUMMARY_COUNT: usize = 1;
/// Upper bound on the requested number of summary sections.
pub const MAX_SUMMARY_COUNT: usize = 10;

/// Sanitize arbitrary string input by trimming whitespace and dropping empties.
pub(crate) fn sanitize_string(value: Option<String>) -> Option<String> {
    value.and_then(|input| {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Keep only the final path component of an uploaded file name.
pub fn sanitize_file_name(value: Option<String>) -> String {
    sanitize_string(value)
        .and_then(|name| {
            name.rsplit(['/', '\\'])
                .next()
                .map(str::trim)
                .filter(|base| !base.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "document.pdf".to_string())
}

/// Lowercase a declared MIME type and drop any parameters.
pub fn sanitize_mime_type(value: Option<String>) -> String {
    sanitize_string(value)
        .map(|mime| {
            mime.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_lowercase()
        })
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

/// Whether a declared MIME type names a PDF.
pub fn is_pdf_mime(mime_type: &str) -> bool {
    mime_type.to_lowercase().contains("pdf")
}

/// Resolve the requested section count, clamped to the supported range.
pub fn sanitize_summary_count(value: Option<usize>, default: usize) -> usize {
    value
        .unwrap_or(default)
        .clamp(MIN_SUMMARY_COUNT, MAX_SUMMARY_COUNT)
}

/// Tidy a summary section produced by a model.
///
/// Strips wrapping quotes and list bullets, and collapses internal runs of whitespace.
pub(crate) fn clean_section(section: &str) -> String {
    let mut trimmed = section.trim();
    for bullet in ["- ", "* ", "• "] {
        if let Some(rest) = trimmed.strip_prefix(bullet) {
            trimmed = rest.trim_start();
            break;
        }
    }
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed = trimmed[1..trimmed.len() - 1].trim();
    }
    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}

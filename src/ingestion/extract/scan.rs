//! Last-resort recovery of printable text from raw PDF bytes.

const STREAM_MARKER: &[u8] = b"stream";
const HEADER_MARKER: &[u8] = b"%PDF-";
/// Leading bytes searched for the `%PDF-` header; readers tolerate junk before it.
pub const HEADER_SEARCH_WINDOW: usize = 1024;
/// Bytes inspected after each `stream` marker, counted from the marker start.
pub const SCAN_WINDOW: usize = 1000;

/// Whether a `%PDF-` header starts within the first [`HEADER_SEARCH_WINDOW`] bytes.
pub fn has_pdf_header(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW + HEADER_MARKER.len() - 1)];
    head.windows(HEADER_MARKER.len())
        .any(|window| window == HEADER_MARKER)
}

/// Copy printable ASCII found after each `stream` marker.
///
/// Windows never overlap: scanning resumes after the end of the previous window. Text from
/// separate windows is separated by a newline.
pub fn scan_stream_text(bytes: &[u8]) -> String {
    let mut text = String::new();
    let mut index = 0;
    while index + STREAM_MARKER.len() <= bytes.len() {
        if &bytes[index..index + STREAM_MARKER.len()] != STREAM_MARKER {
            index += 1;
            continue;
        }

        let start = index + STREAM_MARKER.len();
        let end = (index + SCAN_WINDOW).min(bytes.len());
        let printable: String = bytes[start..end]
            .iter()
            .filter(|byte| (32..=126).contains(*byte))
            .map(|&byte| char::from(byte))
            .collect();
        if !printable.trim().is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(printable.trim());
        }
        index = end;
    }
    text
}

//! Character-window text splitting.
//!
//! Chunks are at most `chunk_size` characters long and consecutive chunks share exactly the
//! effective overlap. A cut prefers a paragraph break, then a line break, then any whitespace,
//! searched in the second half of the window; when none exists the window is cut hard.
//! Dropping the leading overlap from every chunk after the first rebuilds the input exactly.

use super::types::ChunkingError;

/// Default window size, in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 4000;
/// Default overlap between consecutive chunks, in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

#[derive(Clone, Copy)]
enum Separator {
    Paragraph,
    Line,
    Whitespace,
}

impl Separator {
    const PREFERENCE: [Separator; 3] = [Self::Paragraph, Self::Line, Self::Whitespace];

    /// Whether a cut placed before `chars[end]` falls right after this separator.
    fn ends_at(self, chars: &[char], end: usize) -> bool {
        match self {
            Self::Paragraph => end >= 2 && chars[end - 1] == '\n' && chars[end - 2] == '\n',
            Self::Line => end >= 1 && chars[end - 1] == '\n',
            Self::Whitespace => end >= 1 && chars[end - 1].is_whitespace(),
        }
    }
}

/// Overlap actually applied for a window size.
///
/// Clamped below half the window so every chunk advances past the previous one.
pub fn effective_overlap(chunk_size: usize, overlap: usize) -> usize {
    overlap.min(chunk_size.saturating_sub(1) / 2)
}

/// Split `text` into overlapping chunks of at most `chunk_size` characters.
///
/// Whitespace-only input yields no chunks; input that fits the window yields one.
pub fn chunk_text(
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<String>, ChunkingError> {
    if chunk_size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    if total <= chunk_size {
        return Ok(vec![text.to_string()]);
    }

    let mut offsets: Vec<usize> = text.char_indices().map(|(index, _)| index).collect();
    offsets.push(text.len());

    let overlap = effective_overlap(chunk_size, overlap);
    let min_advance = (chunk_size / 2).max(overlap + 1);
    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let hard_end = start + chunk_size;
        if hard_end >= total {
            chunks.push(text[offsets[start]..].to_string());
            break;
        }

        let end = find_cut(&chars, start + min_advance, hard_end);
        chunks.push(text[offsets[start]..offsets[end]].to_string());
        start = end - overlap;
    }

    Ok(chunks)
}

fn find_cut(chars: &[char], lower: usize, upper: usize) -> usize {
    for separator in Separator::PREFERENCE {
        if let Some(end) = (lower..=upper)
            .rev()
            .find(|&end| separator.ends_at(chars, end))
        {
            return end;
        }
    }
    upper
}

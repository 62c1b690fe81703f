//! Recovery of summary sections from generation output.
//!
//! Models do not reliably honour the requested JSON shape, so decoding walks an ordered chain
//! of strategies and stops at the first one that yields sections. The last resort is a fixed
//! message, so decoding itself never fails.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::ingestion::sanitize::clean_section;
use crate::ingestion::types::DecodeMethod;

/// Single section returned when nothing usable could be decoded.
pub const NO_SUMMARY_MESSAGE: &str =
    "No summary could be generated for this document. Please try again with a different PDF.";

/// Pieces at or below this length are dropped when re-splitting a joined string.
const MIN_RESPLIT_CHARS: usize = 30;
/// Re-splitting must produce at least this many pieces to be trusted.
const MIN_RESPLIT_PIECES: usize = 2;
/// Enumerated output must carry at least this many markers to be trusted.
const MIN_NUMBERED_SECTIONS: usize = 3;
/// Paragraphs at or below this length are treated as headings or noise.
const MIN_PARAGRAPH_CHARS: usize = 50;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z]*[ \t]*\r?\n?(.*?)```").expect("fenced block pattern is valid")
});
static NUMBERED_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*\d{1,3}[.)][ \t]+").expect("numbered marker pattern is valid")
});
static BLANK_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n").expect("blank line pattern is valid"));

type Strategy = fn(&str) -> Option<Vec<String>>;

const STRATEGIES: [(DecodeMethod, Strategy); 5] = [
    (DecodeMethod::Strict, decode_strict),
    (DecodeMethod::FencedBlock, decode_fenced),
    (DecodeMethod::Resplit, resplit_joined_summaries),
    (DecodeMethod::NumberedSections, split_numbered_sections),
    (DecodeMethod::Paragraphs, split_paragraphs),
];

/// Sections recovered from one reply.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSections {
    /// Non-empty, cleaned sections, at most the requested count.
    pub sections: Vec<String>,
    /// Strategy that produced them.
    pub method: DecodeMethod,
}

/// Run the decode chain over `content`, keeping at most `target` sections.
pub fn decode_sections(content: &str, target: usize) -> DecodedSections {
    for (method, strategy) in STRATEGIES {
        let Some(raw) = strategy(content) else {
            continue;
        };
        let sections: Vec<String> = raw
            .iter()
            .map(|section| clean_section(section))
            .filter(|section| !section.is_empty())
            .take(target.max(1))
            .collect();
        if !sections.is_empty() {
            return DecodedSections { sections, method };
        }
    }
    absolute_fallback()
}

/// Result used when no strategy applies or the backend failed.
pub fn absolute_fallback() -> DecodedSections {
    DecodedSections {
        sections: vec![NO_SUMMARY_MESSAGE.to_string()],
        method: DecodeMethod::AbsoluteFallback,
    }
}

fn decode_strict(content: &str) -> Option<Vec<String>> {
    let value: Value = serde_json::from_str(content.trim()).ok()?;
    summaries_array(&value)
}

fn decode_fenced(content: &str) -> Option<Vec<String>> {
    fenced_objects(content).find_map(|value| summaries_array(&value))
}

/// Parsed JSON values found in fenced code blocks.
fn fenced_objects(content: &str) -> impl Iterator<Item = Value> + '_ {
    FENCED_BLOCK
        .captures_iter(content)
        .filter_map(|captures| captures.get(1))
        .filter_map(|body| serde_json::from_str(body.as_str().trim()).ok())
}

fn summaries_array(value: &Value) -> Option<Vec<String>> {
    let items = value.get("summaries")?.as_array()?;
    let sections: Vec<String> = items.iter().filter_map(section_text).collect();
    (!sections.is_empty()).then_some(sections)
}

/// Text of one array element; objects are accepted when they carry a text-like field.
fn section_text(item: &Value) -> Option<String> {
    match item {
        Value::String(text) => Some(text.clone()),
        Value::Object(map) => ["summary", "content", "text"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::to_string),
        _ => None,
    }
}

/// The `summaries` field came back as one string instead of an array.
fn resplit_joined_summaries(content: &str) -> Option<Vec<String>> {
    let strict = serde_json::from_str::<Value>(content.trim()).ok();
    strict
        .into_iter()
        .chain(fenced_objects(content))
        .find_map(|value| {
            value
                .get("summaries")
                .and_then(Value::as_str)
                .and_then(resplit)
        })
}

fn resplit(joined: &str) -> Option<Vec<String>> {
    let keep = |pieces: Vec<String>| {
        let pieces: Vec<String> = pieces
            .into_iter()
            .filter(|piece| piece.chars().count() > MIN_RESPLIT_CHARS)
            .collect();
        (pieces.len() >= MIN_RESPLIT_PIECES).then_some(pieces)
    };

    let paragraphs = BLANK_LINE
        .split(joined)
        .map(|piece| piece.trim().to_string())
        .collect();
    keep(paragraphs).or_else(|| keep(split_sentences(joined)))
}

/// Split after `.`, `!` or `?` when followed by whitespace, keeping the punctuation.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((index, ch)) = chars.next() {
        if matches!(ch, '.' | '!' | '?')
            && chars
                .peek()
                .is_some_and(|(_, next)| next.is_whitespace())
        {
            let end = index + ch.len_utf8();
            sentences.push(text[start..end].trim().to_string());
            start = end;
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}

fn split_numbered_sections(content: &str) -> Option<Vec<String>> {
    let markers: Vec<_> = NUMBERED_MARKER.find_iter(content).collect();
    if markers.len() < MIN_NUMBERED_SECTIONS {
        return None;
    }
    let sections: Vec<String> = markers
        .iter()
        .enumerate()
        .map(|(position, marker)| {
            let end = markers
                .get(position + 1)
                .map_or(content.len(), |next| next.start());
            content[marker.end()..end].trim().to_string()
        })
        .filter(|section| !section.is_empty())
        .collect();
    (sections.len() >= MIN_NUMBERED_SECTIONS).then_some(sections)
}

fn split_paragraphs(content: &str) -> Option<Vec<String>> {
    let paragraphs: Vec<String> = BLANK_LINE
        .split(content)
        .map(str::trim)
        .filter(|paragraph| paragraph.chars().count() > MIN_PARAGRAPH_CHARS)
        .map(str::to_string)
        .collect();
    (!paragraphs.is_empty()).then_some(paragraphs)
}

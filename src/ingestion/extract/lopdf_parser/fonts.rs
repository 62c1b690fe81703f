//! Font encodings: turning the bytes of a string operand into Unicode text.
//!
//! A `/ToUnicode` CMap wins whenever the font carries one. Without it, simple fonts read one
//! byte per glyph through `/Differences` and then WinAnsi; composite (Type0) fonts yield
//! nothing, because their codes are glyph ids with no textual meaning.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::LazyLock;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use regex::bytes::Regex;

static CMAP_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<([0-9A-Fa-f\s]*)>|\[|\]|[A-Za-z]+").expect("CMap token pattern is valid")
});

/// Follow a reference to the object it names.
pub(super) fn resolve<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => document.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Decoders for every font in a resource dictionary, keyed by resource name.
///
/// Fonts reached through a reference are shared between pages via `cache`.
pub(super) fn resource_fonts(
    document: &Document,
    resources: &Dictionary,
    cache: &mut HashMap<ObjectId, Rc<FontDecoder>>,
) -> HashMap<Vec<u8>, Rc<FontDecoder>> {
    let Some(fonts) = resources
        .get(b"Font")
        .ok()
        .and_then(|object| resolve(document, object))
        .and_then(|object| object.as_dict().ok())
    else {
        return HashMap::new();
    };

    let mut decoders = HashMap::new();
    for (name, object) in fonts.iter() {
        let decoder = match object {
            Object::Reference(id) => {
                if let Some(cached) = cache.get(id) {
                    Rc::clone(cached)
                } else {
                    let Ok(font) = document.get_dictionary(*id) else {
                        continue;
                    };
                    let decoder = Rc::new(FontDecoder::from_font(document, font));
                    cache.insert(*id, Rc::clone(&decoder));
                    decoder
                }
            }
            Object::Dictionary(font) => Rc::new(FontDecoder::from_font(document, font)),
            _ => continue,
        };
        decoders.insert(name.clone(), decoder);
    }
    decoders
}

/// Maps character codes of one font to text.
#[derive(Debug)]
pub(super) struct FontDecoder {
    code_len: usize,
    composite: bool,
    to_unicode: Option<ToUnicodeMap>,
    differences: HashMap<u8, String>,
}

impl FontDecoder {
    pub(super) fn from_font(document: &Document, font: &Dictionary) -> Self {
        let composite = font
            .get(b"Subtype")
            .and_then(Object::as_name)
            .is_ok_and(|subtype| subtype == b"Type0");
        let to_unicode = font
            .get(b"ToUnicode")
            .ok()
            .and_then(|object| resolve(document, object))
            .and_then(|object| object.as_stream().ok())
            .map(|stream| ToUnicodeMap::parse(&stream_bytes(stream)));
        let code_len = to_unicode
            .as_ref()
            .and_then(|map| map.code_len)
            .unwrap_or(if composite { 2 } else { 1 })
            .clamp(1, 4);
        let differences = if composite {
            HashMap::new()
        } else {
            differences(document, font)
        };
        Self {
            code_len,
            composite,
            to_unicode,
            differences,
        }
    }

    /// Decode a string operand shown in this font.
    pub(super) fn decode(&self, bytes: &[u8]) -> String {
        let mut text = String::new();
        for code in bytes.chunks(self.code_len) {
            if let Some(mapped) = self
                .to_unicode
                .as_ref()
                .and_then(|map| map.lookup(code_value(code)))
            {
                text.extend(mapped.chars().filter(|ch| !ch.is_control()));
                continue;
            }
            if self.composite || code.len() != 1 {
                continue;
            }
            match self.differences.get(&code[0]) {
                Some(glyph) => text.push_str(glyph),
                None => text.extend(win_ansi(code[0])),
            }
        }
        text
    }
}

fn stream_bytes(stream: &Stream) -> Vec<u8> {
    // Unfiltered streams report an error here; their raw content is already decoded.
    stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone())
}

fn differences(document: &Document, font: &Dictionary) -> HashMap<u8, String> {
    let mut table = HashMap::new();
    let Some(entries) = font
        .get(b"Encoding")
        .ok()
        .and_then(|object| resolve(document, object))
        .and_then(|object| object.as_dict().ok())
        .and_then(|encoding| encoding.get(b"Differences").ok())
        .and_then(|object| resolve(document, object))
        .and_then(|object| object.as_array().ok())
    else {
        return table;
    };

    let mut code: Option<u8> = None;
    for entry in entries {
        match entry {
            Object::Integer(value) => code = u8::try_from(*value).ok(),
            Object::Name(name) => {
                if let Some(current) = code {
                    if let Some(text) = glyph_text(name) {
                        table.insert(current, text);
                    }
                    code = current.checked_add(1);
                }
            }
            _ => {}
        }
    }
    table
}

/// Text for a standard glyph name, covering `uniXXXX`, single characters and common names.
fn glyph_text(name: &[u8]) -> Option<String> {
    let name = std::str::from_utf8(name).ok()?;
    if let Some(hex) = name.strip_prefix("uni").filter(|hex| hex.len() == 4) {
        return u32::from_str_radix(hex, 16)
            .ok()
            .and_then(char::from_u32)
            .map(String::from);
    }
    let mut chars = name.chars();
    if let (Some(single), None) = (chars.next(), chars.next()) {
        return Some(single.to_string());
    }
    let text = match name {
        "space" => " ",
        "exclam" => "!",
        "quotedbl" => "\"",
        "numbersign" => "#",
        "dollar" => "$",
        "percent" => "%",
        "ampersand" => "&",
        "quotesingle" => "'",
        "parenleft" => "(",
        "parenright" => ")",
        "asterisk" => "*",
        "plus" => "+",
        "comma" => ",",
        "hyphen" => "-",
        "period" => ".",
        "slash" => "/",
        "colon" => ":",
        "semicolon" => ";",
        "less" => "<",
        "equal" => "=",
        "greater" => ">",
        "question" => "?",
        "at" => "@",
        "underscore" => "_",
        "zero" => "0",
        "one" => "1",
        "two" => "2",
        "three" => "3",
        "four" => "4",
        "five" => "5",
        "six" => "6",
        "seven" => "7",
        "eight" => "8",
        "nine" => "9",
        "quoteleft" => "\u{2018}",
        "quoteright" => "\u{2019}",
        "quotedblleft" => "\u{201C}",
        "quotedblright" => "\u{201D}",
        "bullet" => "\u{2022}",
        "endash" => "\u{2013}",
        "emdash" => "\u{2014}",
        "ellipsis" => "\u{2026}",
        "ff" | "fi" | "fl" | "ffi" | "ffl" => name,
        _ => return None,
    };
    Some(text.to_string())
}

/// WinAnsi code point for a single byte; Latin-1 outside the 0x80..=0x9F block.
fn win_ansi(byte: u8) -> Option<char> {
    let ch = match byte {
        0x80 => '\u{20AC}',
        0x85 => '\u{2026}',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '\u{2022}',
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        0x99 => '\u{2122}',
        other => char::from(other),
    };
    (!ch.is_control()).then_some(ch)
}

/// Parsed `bfchar` and `bfrange` entries of a ToUnicode CMap.
#[derive(Debug, Default)]
struct ToUnicodeMap {
    /// Bytes per code, from the first codespace range.
    code_len: Option<usize>,
    chars: HashMap<u32, String>,
    ranges: Vec<CodeRange>,
}

#[derive(Debug)]
struct CodeRange {
    low: u32,
    high: u32,
    target: RangeTarget,
}

#[derive(Debug)]
enum RangeTarget {
    /// UTF-16 text of `low`; later codes increment its last unit.
    Offset(Vec<u16>),
    /// One entry per code starting at `low`.
    Listed(Vec<String>),
}

enum Token<'a> {
    Hex(Vec<u8>),
    Open,
    Close,
    Word(&'a [u8]),
}

impl ToUnicodeMap {
    fn parse(data: &[u8]) -> Self {
        let mut map = Self::default();
        let mut tokens = tokenize(data).into_iter();
        while let Some(token) = tokens.next() {
            match token {
                Token::Word(b"begincodespacerange") => {
                    if let Some(Token::Hex(low)) = tokens.next() {
                        if !low.is_empty() {
                            map.code_len.get_or_insert(low.len());
                        }
                    }
                }
                Token::Word(b"beginbfchar") => {
                    while let Some(Token::Hex(source)) = tokens.next() {
                        let Some(Token::Hex(target)) = tokens.next() else {
                            break;
                        };
                        map.chars.insert(code_value(&source), utf16_text(&target));
                    }
                }
                Token::Word(b"beginbfrange") => {
                    while let Some(Token::Hex(low)) = tokens.next() {
                        let Some(Token::Hex(high)) = tokens.next() else {
                            break;
                        };
                        let target = match tokens.next() {
                            Some(Token::Hex(start)) => RangeTarget::Offset(utf16_units(&start)),
                            Some(Token::Open) => {
                                let mut listed = Vec::new();
                                while let Some(Token::Hex(target)) = tokens.next() {
                                    listed.push(utf16_text(&target));
                                }
                                RangeTarget::Listed(listed)
                            }
                            _ => break,
                        };
                        map.ranges.push(CodeRange {
                            low: code_value(&low),
                            high: code_value(&high),
                            target,
                        });
                    }
                }
                _ => {}
            }
        }
        map
    }

    fn lookup(&self, code: u32) -> Option<String> {
        if let Some(text) = self.chars.get(&code) {
            return Some(text.clone());
        }
        let range = self
            .ranges
            .iter()
            .find(|range| (range.low..=range.high).contains(&code))?;
        let offset = code - range.low;
        match &range.target {
            RangeTarget::Offset(start) => {
                let mut units = start.clone();
                let last = units.last_mut()?;
                *last = last.wrapping_add(offset as u16);
                Some(String::from_utf16_lossy(&units))
            }
            RangeTarget::Listed(listed) => listed.get(offset as usize).cloned(),
        }
    }
}

fn tokenize(data: &[u8]) -> Vec<Token<'_>> {
    CMAP_TOKEN
        .captures_iter(data)
        .filter_map(|captures| {
            if let Some(digits) = captures.get(1) {
                return Some(Token::Hex(hex_bytes(digits.as_bytes())));
            }
            Some(match captures.get(0)?.as_bytes() {
                b"[" => Token::Open,
                b"]" => Token::Close,
                word => Token::Word(word),
            })
        })
        .collect()
}

fn hex_bytes(digits: &[u8]) -> Vec<u8> {
    let mut digits: Vec<u8> = digits
        .iter()
        .copied()
        .filter(|digit| !digit.is_ascii_whitespace())
        .collect();
    if digits.len() % 2 == 1 {
        digits.push(b'0');
    }
    hex::decode(digits).unwrap_or_default()
}

fn code_value(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .take(4)
        .fold(0, |value, byte| (value << 8) | u32::from(*byte))
}

fn utf16_units(bytes: &[u8]) -> Vec<u16> {
    if bytes.len() >= 2 && bytes.len() % 2 == 0 {
        bytes
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect()
    } else {
        bytes.iter().map(|&byte| u16::from(byte)).collect()
    }
}

fn utf16_text(bytes: &[u8]) -> String {
    String::from_utf16_lossy(&utf16_units(bytes))
}

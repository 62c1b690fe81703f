//! Content-stream interpreter built on `lopdf`.
//!
//! Only the text operators and the current transformation matrix are tracked. String operands
//! are decoded through the selected font's encoding ([`fonts`]). Glyph widths are estimated
//! from the font size because font metrics are not loaded; the estimate is only used to decide
//! where word gaps fall. Form XObjects are not followed.

mod fonts;

use std::collections::HashMap;
use std::rc::Rc;

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId};

use self::fonts::{FontDecoder, resolve, resource_fonts};
use super::{PdfPage, PdfParseError, PdfParser, TextFragment};

const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];
/// Average glyph advance, as a fraction of the font size.
const AVERAGE_GLYPH_WIDTH: f32 = 0.5;
/// `TJ` adjustments below this (in thousandths of an em) read as word gaps.
const WORD_GAP_ADJUSTMENT: f32 = -200.0;
const MAX_PARENT_DEPTH: usize = 32;

/// [`PdfParser`] backed by the `lopdf` container reader.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfParser;

impl PdfParser for LopdfParser {
    fn parse(&self, bytes: &[u8]) -> Result<Vec<PdfPage>, PdfParseError> {
        if bytes.is_empty() {
            return Err(PdfParseError::Empty);
        }
        let document = Document::load_mem(bytes)
            .map_err(|error| PdfParseError::Container(error.to_string()))?;

        let mut pages = Vec::new();
        let mut font_cache = HashMap::new();
        for (number, page_id) in document.get_pages() {
            match page_operations(&document, page_id) {
                Ok(operations) => {
                    let media_box = media_box(&document, page_id);
                    let fonts = inherited(&document, page_id, b"Resources")
                        .and_then(|object| object.as_dict().ok())
                        .map(|resources| resource_fonts(&document, resources, &mut font_cache))
                        .unwrap_or_default();
                    pages.push(PdfPage {
                        fragments: interpret(&operations, media_box, fonts),
                    });
                }
                Err(message) => {
                    tracing::warn!(page = number, %message, "Skipping unreadable page content");
                    pages.push(PdfPage::default());
                }
            }
        }
        Ok(pages)
    }
}

fn page_operations(document: &Document, page_id: ObjectId) -> Result<Vec<Operation>, String> {
    let data = document
        .get_page_content(page_id)
        .map_err(|error| error.to_string())?;
    let content = Content::decode(&data).map_err(|error| error.to_string())?;
    Ok(content.operations)
}

/// Page attribute `key`, inherited through the page tree when absent, with references resolved.
fn inherited<'a>(document: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = document.get_dictionary(page_id).ok();
    let mut depth = 0;
    while let Some(dictionary) = current {
        if let Ok(object) = dictionary.get(key) {
            return resolve(document, object);
        }
        depth += 1;
        if depth > MAX_PARENT_DEPTH {
            break;
        }
        current = dictionary
            .get(b"Parent")
            .and_then(Object::as_reference)
            .and_then(|id| document.get_dictionary(id))
            .ok();
    }
    None
}

fn media_box(document: &Document, page_id: ObjectId) -> [f32; 4] {
    inherited(document, page_id, b"MediaBox")
        .and_then(rectangle)
        .unwrap_or(DEFAULT_MEDIA_BOX)
}

fn rectangle(object: &Object) -> Option<[f32; 4]> {
    let values: Vec<f32> = object.as_array().ok()?.iter().filter_map(number).collect();
    match values.as_slice() {
        [x0, y0, x1, y1] => Some([x0.min(*x1), y0.min(*y1), x0.max(*x1), y0.max(*y1)]),
        _ => None,
    }
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value),
        _ => None,
    }
}

/// Affine transform `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f32; 6]);

impl Matrix {
    const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn translation(tx: f32, ty: f32) -> Self {
        Matrix([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    fn from_operands(operands: &[Object]) -> Option<Self> {
        let values: Vec<f32> = operands.iter().filter_map(number).collect();
        let values: [f32; 6] = values.try_into().ok()?;
        Some(Matrix(values))
    }

    /// `self × other`: apply `self` first, then `other`.
    fn then(self, other: Matrix) -> Matrix {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = other.0;
        Matrix([
            a1 * a2 + b1 * c2,
            a1 * b2 + b1 * d2,
            c1 * a2 + d1 * c2,
            c1 * b2 + d1 * d2,
            e1 * a2 + f1 * c2 + e2,
            e1 * b2 + f1 * d2 + f2,
        ])
    }

    fn apply(self, x: f32, y: f32) -> (f32, f32) {
        let [a, b, c, d, e, f] = self.0;
        (x * a + y * c + e, x * b + y * d + f)
    }
}

/// Graphics-state values saved by `q` and restored by `Q`.
#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    font: Option<Rc<FontDecoder>>,
    font_size: f32,
    leading: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            font: None,
            font_size: 12.0,
            leading: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
        }
    }
}

struct Interpreter {
    state: GraphicsState,
    saved: Vec<GraphicsState>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    media_box: [f32; 4],
    fonts: HashMap<Vec<u8>, Rc<FontDecoder>>,
    fragments: Vec<TextFragment>,
}

fn interpret(
    operations: &[Operation],
    media_box: [f32; 4],
    fonts: HashMap<Vec<u8>, Rc<FontDecoder>>,
) -> Vec<TextFragment> {
    let mut interpreter = Interpreter {
        state: GraphicsState::default(),
        saved: Vec::new(),
        text_matrix: Matrix::IDENTITY,
        line_matrix: Matrix::IDENTITY,
        media_box,
        fonts,
        fragments: Vec::new(),
    };
    for operation in operations {
        interpreter.apply(operation);
    }
    interpreter.fragments
}

impl Interpreter {
    fn apply(&mut self, operation: &Operation) {
        let operands = operation.operands.as_slice();
        let first = operands.first().and_then(number);
        match operation.operator.as_str() {
            "q" => self.saved.push(self.state.clone()),
            "Q" => {
                if let Some(state) = self.saved.pop() {
                    self.state = state;
                }
            }
            "cm" => {
                if let Some(matrix) = Matrix::from_operands(operands) {
                    self.state.ctm = matrix.then(self.state.ctm);
                }
            }
            "BT" => {
                self.text_matrix = Matrix::IDENTITY;
                self.line_matrix = Matrix::IDENTITY;
            }
            "Tf" => {
                if let Some(name) = operands.first().and_then(|object| object.as_name().ok()) {
                    self.state.font = self.fonts.get(name).cloned();
                    if self.state.font.is_none() {
                        tracing::debug!(font = %String::from_utf8_lossy(name), "Font resource not found");
                    }
                }
                if let Some(size) = operands.get(1).and_then(number) {
                    self.state.font_size = size;
                }
            }
            "TL" => self.state.leading = first.unwrap_or(self.state.leading),
            "Tc" => self.state.char_spacing = first.unwrap_or(self.state.char_spacing),
            "Tw" => self.state.word_spacing = first.unwrap_or(self.state.word_spacing),
            "Tz" => {
                if let Some(scale) = first {
                    self.state.horizontal_scale = scale / 100.0;
                }
            }
            "Td" | "TD" => {
                let tx = first.unwrap_or(0.0);
                let ty = operands.get(1).and_then(number).unwrap_or(0.0);
                if operation.operator == "TD" {
                    self.state.leading = -ty;
                }
                self.move_line(tx, ty);
            }
            "Tm" => {
                if let Some(matrix) = Matrix::from_operands(operands) {
                    self.text_matrix = matrix;
                    self.line_matrix = matrix;
                }
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    let text = self.decode(bytes);
                    self.show(&text);
                }
            }
            "'" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.first() {
                    let text = self.decode(bytes);
                    self.show(&text);
                }
            }
            "\"" => {
                if let (Some(word), Some(char_spacing)) = (
                    operands.first().and_then(number),
                    operands.get(1).and_then(number),
                ) {
                    self.state.word_spacing = word;
                    self.state.char_spacing = char_spacing;
                }
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    let text = self.decode(bytes);
                    self.show(&text);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    self.show_array(items);
                }
            }
            _ => {}
        }
    }

    fn decode(&self, bytes: &[u8]) -> String {
        match &self.state.font {
            Some(font) => font.decode(bytes),
            None => decode_pdf_string(bytes),
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = Matrix::translation(tx, ty).then(self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.state.leading);
    }

    /// Horizontal advance of `text` in unscaled text space.
    fn advance(&self, text: &str) -> f32 {
        let state = &self.state;
        let glyphs = text.chars().count() as f32;
        let spaces = text.chars().filter(|ch| *ch == ' ').count() as f32;
        (glyphs * (AVERAGE_GLYPH_WIDTH * state.font_size + state.char_spacing)
            + spaces * state.word_spacing)
            * state.horizontal_scale
    }

    fn show_array(&mut self, items: &[Object]) {
        let mut text = String::new();
        let mut advance = 0.0;
        for item in items {
            match item {
                Object::String(bytes, _) => {
                    let piece = self.decode(bytes);
                    advance += self.advance(&piece);
                    text.push_str(&piece);
                }
                other => {
                    if let Some(adjustment) = number(other) {
                        advance -= adjustment / 1000.0
                            * self.state.font_size
                            * self.state.horizontal_scale;
                        if adjustment < WORD_GAP_ADJUSTMENT
                            && !text.is_empty()
                            && !text.ends_with(' ')
                        {
                            text.push(' ');
                        }
                    }
                }
            }
        }
        self.emit(text, advance);
    }

    fn show(&mut self, text: &str) {
        let advance = self.advance(text);
        self.emit(text.to_string(), advance);
    }

    fn emit(&mut self, text: String, advance: f32) {
        let render = self.text_matrix.then(self.state.ctm);
        let (x, y) = render.apply(0.0, 0.0);
        let (end_x, _) = render.apply(advance, 0.0);
        self.text_matrix = Matrix::translation(advance, 0.0).then(self.text_matrix);

        if text.trim().is_empty() {
            return;
        }
        let [x0, _, _, y1] = self.media_box;
        self.fragments.push(TextFragment {
            text,
            x: x - x0,
            y: y1 - y,
            width: (end_x - x).abs(),
        });
    }
}

/// Decode a string shown without a known font: UTF-16BE when it carries a byte-order mark,
/// otherwise Latin-1.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes
        .iter()
        .map(|&byte| char::from(byte))
        .filter(|ch| !ch.is_control())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Stream, StringFormat, dictionary};

    fn text(value: &str) -> Object {
        Object::String(value.as_bytes().to_vec(), StringFormat::Literal)
    }

    fn int(value: i64) -> Object {
        Object::Integer(value)
    }

    fn op(operator: &str, operands: Vec<Object>) -> Operation {
        Operation::new(operator, operands)
    }

    /// Glyph codes in a subset font whose glyph ids sit 29 below the ASCII code.
    fn glyph_ids(value: &str) -> Object {
        let bytes = value
            .bytes()
            .flat_map(|byte| (u16::from(byte) - 29).to_be_bytes())
            .collect();
        Object::String(bytes, StringFormat::Hexadecimal)
    }

    const SUBSET_CMAP: &str = "/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n\
        1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n\
        1 beginbfrange\n<0003> <005D> <0020>\nendbfrange\nendcmap\nend\nend\n";

    fn helvetica(document: &mut Document) -> Object {
        Object::Reference(document.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        }))
    }

    fn subset_type0(document: &mut Document) -> Object {
        let cmap_id =
            document.add_object(Stream::new(dictionary! {}, SUBSET_CMAP.as_bytes().to_vec()));
        Object::Reference(document.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => "ABCDEF+Arial",
            "Encoding" => "Identity-H",
            "ToUnicode" => cmap_id,
        }))
    }

    fn build_pdf(pages: Vec<Vec<Operation>>) -> Vec<u8> {
        build_pdf_with_fonts(pages, |document| {
            dictionary! { "F1" => helvetica(document) }
        })
    }

    fn build_pdf_with_fonts(
        pages: Vec<Vec<Operation>>,
        fonts: impl FnOnce(&mut Document) -> lopdf::Dictionary,
    ) -> Vec<u8> {
        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();
        let fonts = fonts(&mut document);
        let resources_id = document.add_object(dictionary! {
            "Font" => fonts,
        });
        let mut kids = Vec::new();
        for operations in pages {
            let content = Content { operations };
            let content_id = document.add_object(Stream::new(
                dictionary! {},
                content.encode().expect("encode content"),
            ));
            let page_id = document.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }
        let count = kids.len() as i64;
        document.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![int(0), int(0), int(612), int(792)],
            }),
        );
        let catalog_id = document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        document.trailer.set("Root", catalog_id);
        let mut bytes = Vec::new();
        document.save_to(&mut bytes).expect("save pdf");
        bytes
    }

    #[test]
    fn positions_fragments_from_top_of_page() {
        let bytes = build_pdf(vec![vec![
            op("BT", vec![]),
            op("Tf", vec![Object::Name(b"F1".to_vec()), int(12)]),
            op("Td", vec![int(72), int(700)]),
            op("Tj", vec![text("Hello")]),
            op("ET", vec![]),
        ]]);
        let pages = LopdfParser.parse(&bytes).expect("parse");
        assert_eq!(pages.len(), 1);
        let fragment = &pages[0].fragments[0];
        assert_eq!(fragment.text, "Hello");
        assert_eq!(fragment.x, 72.0);
        assert_eq!(fragment.y, 92.0);
        assert_eq!(fragment.width, 30.0);
    }

    #[test]
    fn leading_moves_to_following_lines() {
        let bytes = build_pdf(vec![vec![
            op("BT", vec![]),
            op("Tf", vec![Object::Name(b"F1".to_vec()), int(10)]),
            op("TL", vec![int(14)]),
            op("Td", vec![int(50), int(742)]),
            op("Tj", vec![text("first")]),
            op("T*", vec![]),
            op("Tj", vec![text("second")]),
            op("'", vec![text("third")]),
            op("ET", vec![]),
        ]]);
        let pages = LopdfParser.parse(&bytes).expect("parse");
        let ys: Vec<f32> = pages[0].fragments.iter().map(|f| f.y).collect();
        assert_eq!(ys, vec![50.0, 64.0, 78.0]);
        assert!(pages[0].fragments.iter().all(|f| f.x == 50.0));
    }

    #[test]
    fn tj_arrays_insert_spaces_at_large_gaps() {
        let bytes = build_pdf(vec![vec![
            op("BT", vec![]),
            op("Tm", vec![int(1), int(0), int(0), int(1), int(20), int(600)]),
            op(
                "TJ",
                vec![Object::Array(vec![
                    text("Kern"),
                    int(-50),
                    text("ed"),
                    int(-400),
                    text("words"),
                ])],
            ),
            op("ET", vec![]),
        ]]);
        let pages = LopdfParser.parse(&bytes).expect("parse");
        assert_eq!(pages[0].fragments[0].text, "Kerned words");
    }

    #[test]
    fn cm_translates_text_origin() {
        let bytes = build_pdf(vec![vec![
            op("q", vec![]),
            op("cm", vec![int(1), int(0), int(0), int(1), int(100), int(-100)]),
            op("BT", vec![]),
            op("Td", vec![int(10), int(700)]),
            op("Tj", vec![text("moved")]),
            op("ET", vec![]),
            op("Q", vec![]),
            op("BT", vec![]),
            op("Td", vec![int(10), int(700)]),
            op("Tj", vec![text("plain")]),
            op("ET", vec![]),
        ]]);
        let pages = LopdfParser.parse(&bytes).expect("parse");
        let fragments = &pages[0].fragments;
        assert_eq!((fragments[0].x, fragments[0].y), (110.0, 192.0));
        assert_eq!((fragments[1].x, fragments[1].y), (10.0, 92.0));
    }

    #[test]
    fn identity_h_codes_are_mapped_through_to_unicode() {
        let bytes = build_pdf_with_fonts(
            vec![vec![
                op("BT", vec![]),
                op("Tf", vec![Object::Name(b"F2".to_vec()), int(12)]),
                op("Td", vec![int(72), int(700)]),
                op("Tj", vec![glyph_ids("Photosynthesis")]),
                op("ET", vec![]),
            ]],
            |document| dictionary! { "F2" => subset_type0(document) },
        );
        let pages = LopdfParser.parse(&bytes).expect("parse");
        let fragment = &pages[0].fragments[0];
        assert_eq!(fragment.text, "Photosynthesis");
        assert_eq!(fragment.width, 84.0);
    }

    #[test]
    fn tf_switches_between_simple_and_composite_fonts() {
        let bytes = build_pdf_with_fonts(
            vec![vec![
                op("BT", vec![]),
                op("Tf", vec![Object::Name(b"F2".to_vec()), int(10)]),
                op("Td", vec![int(40), int(700)]),
                op(
                    "TJ",
                    vec![Object::Array(vec![
                        glyph_ids("Light"),
                        int(-500),
                        glyph_ids("reactions"),
                    ])],
                ),
                op("Tf", vec![Object::Name(b"F1".to_vec()), int(10)]),
                op("Td", vec![int(0), int(-14)]),
                op("Tj", vec![text("Calvin cycle")]),
                op("ET", vec![]),
            ]],
            |document| {
                dictionary! {
                    "F1" => helvetica(document),
                    "F2" => subset_type0(document),
                }
            },
        );
        let pages = LopdfParser.parse(&bytes).expect("parse");
        let texts: Vec<&str> = pages[0].fragments.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(texts, vec!["Light reactions", "Calvin cycle"]);
    }

    #[test]
    fn utf16_strings_are_decoded() {
        assert_eq!(
            decode_pdf_string(&[0xFE, 0xFF, 0x00, 0x48, 0x00, 0xE9]),
            "Hé"
        );
        assert_eq!(decode_pdf_string(b"plain\x00"), "plain");
    }

    #[test]
    fn rejects_garbage_and_empty_input() {
        assert!(matches!(
            LopdfParser.parse(b""),
            Err(PdfParseError::Empty)
        ));
        assert!(matches!(
            LopdfParser.parse(b"definitely not a pdf"),
            Err(PdfParseError::Container(_))
        ));
    }
}

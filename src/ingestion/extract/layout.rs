//! Line reconstruction from positioned text fragments.

use std::collections::BTreeMap;

use thiserror::Error;

use super::{PdfPage, TextFragment};

/// Vertical distance under which fragments are considered part of the same line.
pub const BAND_TOLERANCE: f32 = 10.0;
/// Horizontal gap above which a space is inserted between neighbouring fragments.
pub const GAP_THRESHOLD: f32 = 10.0;

/// Raised when fragment geometry cannot be ordered.
#[derive(Debug, Error, PartialEq)]
pub enum LayoutError {
    /// A fragment carried a NaN or infinite coordinate.
    #[error("fragment on page {page} has a non-finite position")]
    NonFinitePosition {
        /// One-based page number.
        page: usize,
    },
}

/// Rebuild reading-order text for every page.
///
/// Each band becomes one line and each page ends with a blank line.
pub fn reconstruct_document(pages: &[PdfPage]) -> Result<String, LayoutError> {
    let mut text = String::new();
    for (index, page) in pages.iter().enumerate() {
        let lines = reconstruct_page(page)
            .map_err(|_| LayoutError::NonFinitePosition { page: index + 1 })?;
        text.push_str(&lines);
        text.push_str("\n\n");
    }
    Ok(text)
}

/// Rebuild the lines of a single page, top to bottom.
pub fn reconstruct_page(page: &PdfPage) -> Result<String, LayoutError> {
    let mut bands: BTreeMap<i64, Vec<&TextFragment>> = BTreeMap::new();
    for fragment in &page.fragments {
        if !(fragment.x.is_finite() && fragment.y.is_finite() && fragment.width.is_finite()) {
            return Err(LayoutError::NonFinitePosition { page: 0 });
        }
        bands.entry(band_key(fragment.y)).or_default().push(fragment);
    }

    let mut text = String::new();
    for (_, mut row) in bands {
        // Stable sort keeps content-stream order for fragments sharing an x.
        row.sort_by(|a, b| a.x.total_cmp(&b.x));
        let mut line = String::new();
        let mut previous_end: Option<f32> = None;
        for fragment in row {
            if let Some(end) = previous_end {
                if fragment.x - end > GAP_THRESHOLD && !line.ends_with(' ') {
                    line.push(' ');
                }
            }
            line.push_str(&fragment.text);
            previous_end = Some(fragment.x + fragment.width.max(0.0));
        }
        text.push_str(&line);
        text.push('\n');
    }
    Ok(text)
}

/// Join every fragment with single spaces, ignoring geometry.
pub fn join_fragments(pages: &[PdfPage]) -> String {
    pages
        .iter()
        .map(|page| {
            page.fragments
                .iter()
                .map(|fragment| fragment.text.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn band_key(y: f32) -> i64 {
    (y / BAND_TOLERANCE).round() as i64 * BAND_TOLERANCE as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(text: &str, x: f32, y: f32, width: f32) -> TextFragment {
        TextFragment {
            text: text.to_string(),
            x,
            y,
            width,
        }
    }

    fn two_column_page(page: usize) -> PdfPage {
        let mut fragments = Vec::new();
        for row in 0..3 {
            let y = 100.0 + row as f32 * 20.0;
            fragments.push(fragment(&format!("L{page}.{row}"), 0.0, y, 50.0));
            fragments.push(fragment(&format!("R{page}.{row}"), 300.0, y, 50.0));
        }
        // Content order interleaves the columns bottom row first.
        fragments.reverse();
        PdfPage { fragments }
    }

    #[test]
    fn two_column_pages_read_row_by_row() {
        let pages: Vec<PdfPage> = (1..=3).map(two_column_page).collect();
        let text = reconstruct_document(&pages).expect("layout");
        let expected = (1..=3)
            .map(|page| {
                (0..3)
                    .map(|row| format!("L{page}.{row} R{page}.{row}\n"))
                    .collect::<String>()
                    + "\n\n"
            })
            .collect::<String>();
        assert_eq!(text, expected);
    }

    #[test]
    fn close_fragments_are_joined_without_space() {
        let page = PdfPage {
            fragments: vec![
                fragment("Hel", 10.0, 50.0, 15.0),
                fragment("lo", 26.0, 52.0, 10.0),
            ],
        };
        assert_eq!(reconstruct_page(&page).expect("layout"), "Hello\n");
    }

    #[test]
    fn nearby_baselines_share_a_band() {
        let page = PdfPage {
            fragments: vec![
                fragment("second", 0.0, 71.0, 30.0),
                fragment("first", 0.0, 49.0, 30.0),
                fragment("same", 60.0, 52.0, 30.0),
            ],
        };
        assert_eq!(
            reconstruct_page(&page).expect("layout"),
            "first same\nsecond\n"
        );
    }

    #[test]
    fn non_finite_positions_are_rejected() {
        let pages = vec![
            PdfPage::default(),
            PdfPage {
                fragments: vec![fragment("bad", f32::NAN, 10.0, 5.0)],
            },
        ];
        assert_eq!(
            reconstruct_document(&pages),
            Err(LayoutError::NonFinitePosition { page: 2 })
        );
    }

    #[test]
    fn join_fragments_ignores_geometry() {
        let pages = vec![
            PdfPage {
                fragments: vec![fragment("b", 50.0, 0.0, 5.0), fragment("a", 0.0, 0.0, 5.0)],
            },
            PdfPage {
                fragments: vec![fragment("c", 0.0, 0.0, 5.0)],
            },
        ];
        assert_eq!(join_fragments(&pages), "b a\n\nc");
    }
}

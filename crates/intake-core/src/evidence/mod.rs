//! Positioned OCR evidence.
//!
//! Evidence is the provenance layer of the pipeline: every extracted value
//! can point back at the OCR tokens that support it. Tokens are ordered by
//! page index first, then by the engine's reading order within a page, and
//! that ordering is relied upon by the extraction strategies.

mod extractor;
mod tesseract;

pub use extractor::{EvidenceExtractor, OcrEngine, RecognizedToken};
pub use tesseract::TesseractEngine;

use serde::{Deserialize, Serialize};

/// One page of the source document, as handed in by the caller.
#[derive(Debug, Clone)]
pub struct RawPage {
    /// Zero-based page index.
    pub page_index: u32,

    /// Encoded image bytes (PNG, JPEG, ...).
    pub bytes: Vec<u8>,
}

impl RawPage {
    pub fn new(page_index: u32, bytes: Vec<u8>) -> Self {
        Self { page_index, bytes }
    }
}

/// Axis-aligned bounding box in source-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Clamp the box into a page of the given pixel dimensions. Extents
    /// stay non-negative.
    pub fn clamp_to(&self, page_width: u32, page_height: u32) -> Self {
        let pw = page_width as f32;
        let ph = page_height as f32;
        let x = self.x.clamp(0.0, pw);
        let y = self.y.clamp(0.0, ph);
        Self {
            x,
            y,
            width: self.width.max(0.0).min(pw - x),
            height: self.height.max(0.0).min(ph - y),
        }
    }

    /// Whether the box lies within a page of the given pixel dimensions.
    pub fn within(&self, page_width: u32, page_height: u32) -> bool {
        self.x >= 0.0
            && self.y >= 0.0
            && self.width >= 0.0
            && self.height >= 0.0
            && self.x + self.width <= page_width as f32
            && self.y + self.height <= page_height as f32
    }
}

/// One OCR-recognized token with its position and engine confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceUnit {
    /// Recognized text.
    pub text: String,

    /// Bounding box in page pixel coordinates.
    pub bbox: BoundingBox,

    /// Zero-based page index.
    pub page_index: u32,

    /// Engine confidence (0.0 - 1.0).
    pub confidence: f32,
}

/// Evidence for a single page, in engine reading order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageEvidence {
    /// Zero-based page index.
    pub page_index: u32,

    /// Page pixel dimensions (width, height).
    pub dimensions: (u32, u32),

    /// Recognized tokens in reading order.
    pub tokens: Vec<EvidenceUnit>,
}

impl PageEvidence {
    /// An empty page, recorded when OCR failed for it.
    pub fn empty(page_index: u32) -> Self {
        Self {
            page_index,
            dimensions: (0, 0),
            tokens: Vec::new(),
        }
    }
}

/// Weak back-reference from an extracted value to supporting evidence.
///
/// Index links only: holding a ref never keeps evidence alive or allows
/// mutating it, and both sides serialize independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRef {
    /// Short source quote, for display and audit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,

    /// Page index of the supporting token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_index: Option<u32>,

    /// Token index within that page's evidence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_index: Option<usize>,
}

impl EvidenceRef {
    /// A quote with no positional link (no matching token was found).
    pub fn quote_only(quote: impl Into<String>) -> Self {
        Self {
            quote: Some(quote.into()),
            page_index: None,
            token_index: None,
        }
    }

    pub fn located(quote: impl Into<String>, page_index: u32, token_index: usize) -> Self {
        Self {
            quote: Some(quote.into()),
            page_index: Some(page_index),
            token_index: Some(token_index),
        }
    }
}

/// Whether two consecutive tokens sit on the same text line, judged by
/// vertical overlap of their boxes.
fn same_line(a: &EvidenceUnit, b: &EvidenceUnit) -> bool {
    let tolerance = a.bbox.height.max(b.bbox.height).max(1.0) * 0.6;
    (a.bbox.y - b.bbox.y).abs() <= tolerance
}

/// Span of one token inside the joined document text.
#[derive(Debug, Clone, Copy)]
struct TokenSpan {
    start: usize,
    end: usize,
    page_index: u32,
    token_index: usize,
}

/// All evidence for a document, pages concatenated in page-index order.
#[derive(Debug, Clone)]
pub struct DocumentEvidence {
    pages: Vec<PageEvidence>,
    warnings: Vec<String>,
    full_text: String,
    spans: Vec<TokenSpan>,
}

impl DocumentEvidence {
    /// Build document evidence from per-page results. `pages` must already
    /// be in page-index order; the joined text and the offset index are
    /// derived here once. Tokens whose boxes sit on roughly the same
    /// vertical position join into one text line, so label-proximity
    /// patterns see the document's line structure.
    pub fn new(pages: Vec<PageEvidence>, warnings: Vec<String>) -> Self {
        let mut full_text = String::new();
        let mut spans = Vec::new();

        for page in &pages {
            let mut prev: Option<&EvidenceUnit> = None;
            for (token_index, token) in page.tokens.iter().enumerate() {
                if let Some(prev) = prev {
                    if same_line(prev, token) {
                        full_text.push(' ');
                    } else {
                        full_text.push('\n');
                    }
                }
                let start = full_text.len();
                full_text.push_str(&token.text);
                spans.push(TokenSpan {
                    start,
                    end: full_text.len(),
                    page_index: page.page_index,
                    token_index,
                });
                prev = Some(token);
            }
            if !page.tokens.is_empty() {
                full_text.push('\n');
            }
        }

        Self {
            pages,
            warnings,
            full_text,
            spans,
        }
    }

    pub fn pages(&self) -> &[PageEvidence] {
        &self.pages
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Joined token text, pages separated by newlines.
    pub fn full_text(&self) -> &str {
        &self.full_text
    }

    /// Total token count across pages.
    pub fn token_count(&self) -> usize {
        self.spans.len()
    }

    /// Locate the token covering (or nearest after) a byte offset into
    /// [`full_text`](Self::full_text). Used to link regex matches back to
    /// their source tokens.
    pub fn token_at_offset(&self, offset: usize) -> Option<(u32, usize)> {
        let idx = self.spans.partition_point(|s| s.end <= offset);
        self.spans.get(idx).map(|s| (s.page_index, s.token_index))
    }

    /// Find the token whose text equals `needle` after lowercasing and
    /// trimming surrounding `,:.$` punctuation. First match in reading
    /// order wins.
    pub fn find_token(&self, needle: &str) -> Option<(u32, usize)> {
        let wanted = needle.trim_matches(|c| ",:.$".contains(c)).to_lowercase();
        if wanted.is_empty() {
            return None;
        }
        for page in &self.pages {
            for (token_index, token) in page.tokens.iter().enumerate() {
                let have = token
                    .text
                    .trim_matches(|c| ",:.$".contains(c))
                    .to_lowercase();
                if have == wanted {
                    return Some((page.page_index, token_index));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(text: &str, page: u32) -> EvidenceUnit {
        EvidenceUnit {
            text: text.to_string(),
            bbox: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            page_index: page,
            confidence: 0.9,
        }
    }

    fn page(index: u32, words: &[&str]) -> PageEvidence {
        PageEvidence {
            page_index: index,
            dimensions: (800, 600),
            tokens: words.iter().map(|w| token(w, index)).collect(),
        }
    }

    #[test]
    fn test_full_text_joins_pages_in_order() {
        let evidence = DocumentEvidence::new(
            vec![page(0, &["Claim", "Number:"]), page(1, &["Total:"])],
            Vec::new(),
        );
        assert_eq!(evidence.full_text(), "Claim Number:\nTotal:\n");
    }

    #[test]
    fn test_token_at_offset() {
        let evidence =
            DocumentEvidence::new(vec![page(0, &["Claim", "Number:"]), page(1, &["Total:"])], Vec::new());
        // "Claim" starts at 0, "Number:" at 6, "Total:" at 14.
        assert_eq!(evidence.token_at_offset(0), Some((0, 0)));
        assert_eq!(evidence.token_at_offset(8), Some((0, 1)));
        assert_eq!(evidence.token_at_offset(14), Some((1, 0)));
    }

    #[test]
    fn test_find_token_ignores_punctuation_and_case() {
        let evidence = DocumentEvidence::new(vec![page(0, &["Total:", "$125.00"])], Vec::new());
        assert_eq!(evidence.find_token("total"), Some((0, 0)));
        assert_eq!(evidence.find_token("125.00"), Some((0, 1)));
    }

    #[test]
    fn test_bbox_clamping() {
        let bbox = BoundingBox::new(-5.0, 10.0, 900.0, 20.0).clamp_to(800, 600);
        assert!(bbox.within(800, 600));
        assert_eq!(bbox.x, 0.0);
        assert_eq!(bbox.width, 800.0);
    }
}

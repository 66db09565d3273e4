//! Evidence collection over raw pages.

use tracing::{debug, warn};

use crate::error::OcrError;

use super::{BoundingBox, DocumentEvidence, EvidenceUnit, PageEvidence, RawPage};

/// One token as recognized by an OCR engine, before it is attached to a
/// page.
#[derive(Debug, Clone)]
pub struct RecognizedToken {
    pub text: String,
    pub bbox: BoundingBox,
    pub confidence: f32,
}

/// Boundary capability: turn one page image into positioned tokens.
///
/// Implementations may fail per call; the extractor treats every failure as
/// recoverable for that page.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &[u8]) -> Result<Vec<RecognizedToken>, OcrError>;
}

/// Runs the OCR engine page by page and assembles ordered document
/// evidence.
pub struct EvidenceExtractor<'a> {
    engine: &'a dyn OcrEngine,
    min_token_confidence: f32,
}

impl<'a> EvidenceExtractor<'a> {
    pub fn new(engine: &'a dyn OcrEngine) -> Self {
        Self {
            engine,
            min_token_confidence: 0.0,
        }
    }

    /// Drop tokens below the given engine confidence.
    pub fn with_min_token_confidence(mut self, threshold: f32) -> Self {
        self.min_token_confidence = threshold;
        self
    }

    /// Collect evidence for all pages. Pages are reassembled in page-index
    /// order regardless of input order; a page whose image fails to decode
    /// or whose OCR call fails contributes empty evidence and a warning
    /// instead of aborting the document.
    pub fn collect(&self, pages: &[RawPage]) -> DocumentEvidence {
        let mut ordered: Vec<&RawPage> = pages.iter().collect();
        ordered.sort_by_key(|p| p.page_index);

        let mut page_evidence = Vec::with_capacity(ordered.len());
        let mut warnings = Vec::new();

        for page in ordered {
            match self.collect_page(page) {
                Ok(evidence) => {
                    debug!(
                        page = page.page_index,
                        tokens = evidence.tokens.len(),
                        "collected page evidence"
                    );
                    page_evidence.push(evidence);
                }
                Err(e) => {
                    warn!(page = page.page_index, error = %e, "OCR failed for page");
                    warnings.push(format!("OCR failed for page {}: {}", page.page_index, e));
                    page_evidence.push(PageEvidence::empty(page.page_index));
                }
            }
        }

        DocumentEvidence::new(page_evidence, warnings)
    }

    fn collect_page(&self, page: &RawPage) -> Result<PageEvidence, OcrError> {
        let dimensions = image::load_from_memory(&page.bytes)
            .map(|img| (img.width(), img.height()))
            .map_err(|e| OcrError::InvalidImage(e.to_string()))?;

        let tokens = self.engine.recognize(&page.bytes)?;
        let (width, height) = dimensions;

        let units = tokens
            .into_iter()
            .filter(|t| !t.text.trim().is_empty())
            .filter(|t| t.confidence >= self.min_token_confidence)
            .map(|t| EvidenceUnit {
                text: t.text,
                bbox: t.bbox.clamp_to(width, height),
                page_index: page.page_index,
                confidence: t.confidence.clamp(0.0, 1.0),
            })
            .collect();

        Ok(PageEvidence {
            page_index: page.page_index,
            dimensions,
            tokens: units,
        })
    }
}

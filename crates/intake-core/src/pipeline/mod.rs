//! Pipeline orchestration.
//!
//! Sequences evidence collection, type resolution, extraction,
//! validation, scoring, and routing. Only unrecoverable input errors and
//! type-resolution failures abort a run; every other stage failure
//! degrades into the result. A caller always gets a complete
//! [`ExtractionResult`] or one of the two fatal errors, never a partial
//! record.

pub mod route;
pub mod score;
pub mod validate;

pub use route::{route, RoutingDecision};
pub use score::{ScoredField, ScoredLineItem};
pub use validate::{ValidatedField, ValidatedLineItem, Violation};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{InputError, IntakeError};
use crate::evidence::{EvidenceExtractor, OcrEngine, RawPage, TesseractEngine};
use crate::extract::{
    AutoFallbackExtractor, ExtractionMethod, FallbackStrategy, FieldExtraction,
    HttpExtractionClient, ModelStrategy,
};
use crate::models::config::IntakeConfig;
use crate::schema::{resolve_document_type, DocumentType, SchemaRegistry};

/// The pipeline's sole output. Owned and constructed here; persistence
/// and display belong to external collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub document_id: String,

    pub document_type: DocumentType,

    /// Scored fields in schema order.
    pub fields: Vec<ScoredField>,

    pub line_items: Vec<ScoredLineItem>,

    /// Weighted document-level confidence (0.0 - 1.0).
    pub document_confidence: f32,

    pub decision: RoutingDecision,

    /// Critical fields that were absent or invalid.
    pub missing_critical: Vec<String>,

    /// Recoverable stage failures (OCR page failures, service fallback).
    pub warnings: Vec<String>,
}

/// The extraction-to-decision pipeline.
///
/// Stateless between invocations: each run owns its own evidence-to-
/// result chain, and the registry is read-only, so one instance serves
/// concurrent documents without locking.
pub struct Pipeline {
    config: IntakeConfig,
    registry: SchemaRegistry,
    ocr: Arc<dyn OcrEngine>,
    extractor: Arc<dyn FieldExtraction>,
}

impl Pipeline {
    pub fn new(
        config: IntakeConfig,
        registry: SchemaRegistry,
        ocr: Arc<dyn OcrEngine>,
        extractor: Arc<dyn FieldExtraction>,
    ) -> Self {
        Self {
            config,
            registry,
            ocr,
            extractor,
        }
    }

    /// Standard deployment wiring: tesseract OCR, and the model strategy
    /// with automatic fallback when a service is configured, the
    /// deterministic fallback alone otherwise.
    pub fn from_config(config: IntakeConfig) -> Self {
        let registry = SchemaRegistry::from_config(&config);
        let ocr: Arc<dyn OcrEngine> = Arc::new(TesseractEngine::from_config(&config.ocr));

        let fallback = FallbackStrategy::new(config.scoring.fallback_ceiling);
        let extractor: Arc<dyn FieldExtraction> = if config.service.is_configured() {
            let client = Arc::new(HttpExtractionClient::new(&config.service));
            let model = ModelStrategy::new(client, &config.service);
            Arc::new(AutoFallbackExtractor::new(Box::new(model), fallback))
        } else {
            Arc::new(fallback)
        };

        Self::new(config, registry, ocr, extractor)
    }

    pub fn config(&self) -> &IntakeConfig {
        &self.config
    }

    /// Process one document: raw pages in, extraction result and routing
    /// decision out.
    pub async fn process(
        &self,
        document_id: &str,
        pages: &[RawPage],
        type_hint: Option<&str>,
    ) -> Result<ExtractionResult, IntakeError> {
        if pages.is_empty() {
            return Err(InputError::NoPages.into());
        }

        info!(document_id, pages = pages.len(), "processing document");

        // OCR evidence, pages reassembled in index order.
        let evidence = EvidenceExtractor::new(self.ocr.as_ref())
            .with_min_token_confidence(self.config.ocr.min_token_confidence)
            .collect(pages);
        let mut warnings = evidence.warnings().to_vec();

        // Validation needs a resolved type; failure here is fatal and
        // distinct so the caller can supply a hint.
        let document_type = resolve_document_type(type_hint, evidence.full_text())?;
        let schema = self.registry.schema_for(document_type);
        debug!(%document_type, tokens = evidence.token_count(), "document type resolved");

        // Extraction. The configured stack already degrades internally;
        // if a custom extractor still errors, the deterministic fallback
        // guarantees a candidate set.
        let candidates = match self.extractor.extract(schema, &evidence).await {
            Ok(set) => set,
            Err(e) => {
                let mut set = FallbackStrategy::new(self.config.scoring.fallback_ceiling)
                    .extract(schema, &evidence)
                    .await
                    .unwrap_or_default();
                set.warnings
                    .push(format!("extraction failed, used fallback: {}", e));
                set
            }
        };

        let method = dominant_method(&candidates.fields);
        let candidates = candidates.align_to_schema(schema, method);
        warnings.extend(candidates.warnings.iter().cloned());

        // Validate, score, route.
        let validated = validate::validate_fields(schema, candidates.fields);
        let validated_items = validate::validate_line_items(candidates.line_items);

        let penalty = self.config.scoring.validity_penalty;
        let fields = score::score_fields(validated, penalty);
        let line_items = score::score_line_items(validated_items, penalty);

        let document_confidence =
            score::document_confidence(&fields, &line_items, self.config.scoring.field_weight);
        let (decision, missing_critical) = route::route(
            schema,
            &fields,
            document_confidence,
            self.config.routing.confidence_threshold,
        );

        info!(
            document_id,
            %document_type,
            document_confidence,
            ?decision,
            "document processed"
        );

        Ok(ExtractionResult {
            document_id: document_id.to_string(),
            document_type,
            fields,
            line_items,
            document_confidence,
            decision,
            missing_critical,
            warnings,
        })
    }
}

/// Tag used for filler candidates when aligning a custom extractor's
/// output to the schema.
fn dominant_method(fields: &[crate::extract::FieldCandidate]) -> ExtractionMethod {
    if fields.iter().any(|f| f.method == ExtractionMethod::Model) {
        ExtractionMethod::Model
    } else {
        ExtractionMethod::Fallback
    }
}

//! Core library for document intake processing.
//!
//! This crate provides:
//! - OCR evidence collection with positional token provenance
//! - Structured field extraction (model service with deterministic fallback)
//! - Document-type schema registry for insurance claims and medical bills
//! - Type/format validation and confidence scoring
//! - Review routing (auto-approve vs. human review queue)

pub mod error;
pub mod evidence;
pub mod extract;
pub mod models;
pub mod pipeline;
pub mod schema;

pub use error::{InputError, IntakeError, OcrError, Result, ServiceError, TypeResolutionError};
pub use evidence::{
    BoundingBox, DocumentEvidence, EvidenceExtractor, EvidenceRef, EvidenceUnit, OcrEngine,
    PageEvidence, RawPage, RecognizedToken, TesseractEngine,
};
pub use extract::{
    AutoFallbackExtractor, CandidateSet, ExtractionMethod, ExtractionService, FallbackStrategy,
    FieldCandidate, FieldExtraction, FieldValue, HttpExtractionClient, LineItemCandidate,
    ModelStrategy,
};
pub use models::config::IntakeConfig;
pub use pipeline::{
    ExtractionResult, Pipeline, RoutingDecision, ScoredField, ScoredLineItem, ValidatedField,
    ValidatedLineItem, Violation,
};
pub use schema::{
    resolve_document_type, DocumentType, DocumentTypeSchema, FieldDef, FieldKind, SchemaRegistry,
};

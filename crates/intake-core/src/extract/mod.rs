//! Field extraction from document evidence.
//!
//! Two interchangeable strategies sit behind [`FieldExtraction`]: the
//! model-based [`ModelStrategy`] and the deterministic
//! [`FallbackStrategy`]. A deployment picks one at construction time;
//! [`AutoFallbackExtractor`] wraps the model strategy so any service
//! failure degrades into the fallback instead of surfacing to the caller.

pub mod fallback;
pub mod model;
pub mod rules;
pub mod service;

pub use fallback::FallbackStrategy;
pub use model::ModelStrategy;
pub use service::{ExtractionService, HttpExtractionClient, ServicePayload};

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ServiceError;
use crate::evidence::{DocumentEvidence, EvidenceRef};
use crate::schema::DocumentTypeSchema;

/// How a candidate value was extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Structured extraction by the external model service.
    Model,
    /// Deterministic pattern rules.
    Fallback,
}

/// A typed extracted value. Untagged so amounts serialize as decimal
/// strings, dates as ISO strings, and free text as plain strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Amount(Decimal),
    Date(NaiveDate),
    Text(String),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_amount(&self) -> Option<Decimal> {
        match self {
            FieldValue::Amount(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Display form, as shown in review UIs and CLI output.
    pub fn display(&self) -> String {
        match self {
            FieldValue::Amount(d) => d.to_string(),
            FieldValue::Date(d) => d.to_string(),
            FieldValue::Text(s) => s.clone(),
        }
    }
}

/// Candidate value for one schema field. Immutable once produced;
/// validation and scoring wrap it rather than changing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldCandidate {
    /// Schema field name.
    pub name: String,

    /// Extracted value, absent when neither strategy found the field.
    pub value: Option<FieldValue>,

    /// Supporting evidence links.
    pub evidence: Vec<EvidenceRef>,

    /// Extraction provenance.
    pub method: ExtractionMethod,

    /// Extraction confidence (0.0 - 1.0).
    pub confidence: f32,
}

impl FieldCandidate {
    /// Candidate for a field neither strategy found.
    pub fn missing(name: impl Into<String>, method: ExtractionMethod) -> Self {
        Self {
            name: name.into(),
            value: None,
            evidence: Vec::new(),
            method,
            confidence: 0.0,
        }
    }

    pub fn is_absent(&self) -> bool {
        match &self.value {
            None => true,
            Some(FieldValue::Text(s)) => s.trim().is_empty(),
            Some(_) => false,
        }
    }
}

/// Candidate for one repeating line item (service, code, amount).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItemCandidate {
    pub service: Option<String>,
    pub code: Option<String>,
    pub amount: Option<Decimal>,

    /// Extraction confidence for the whole row (0.0 - 1.0).
    pub confidence: f32,

    /// Supporting evidence links.
    pub evidence: Vec<EvidenceRef>,

    /// Extraction provenance.
    pub method: ExtractionMethod,
}

/// Output of one extraction strategy: a candidate per schema field, in
/// schema order, plus line items and stage warnings.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    pub fields: Vec<FieldCandidate>,
    pub line_items: Vec<LineItemCandidate>,
    pub warnings: Vec<String>,
}

impl CandidateSet {
    /// Reorder fields to schema order and fill in missing candidates so
    /// every defined field is present exactly once. Fields not in the
    /// schema are dropped.
    pub fn align_to_schema(self, schema: &DocumentTypeSchema, method: ExtractionMethod) -> Self {
        let CandidateSet {
            fields,
            line_items,
            warnings,
        } = self;

        let aligned = schema
            .fields
            .iter()
            .map(|def| {
                fields
                    .iter()
                    .find(|c| c.name == def.name)
                    .cloned()
                    .unwrap_or_else(|| FieldCandidate::missing(def.name, method))
            })
            .collect();

        Self {
            fields: aligned,
            line_items,
            warnings,
        }
    }
}

/// One extraction strategy: evidence plus a target schema in, a complete
/// candidate set out.
#[async_trait]
pub trait FieldExtraction: Send + Sync {
    async fn extract(
        &self,
        schema: &DocumentTypeSchema,
        evidence: &DocumentEvidence,
    ) -> Result<CandidateSet, ServiceError>;
}

/// Runtime fallback wrapper: tries the primary (model) strategy and
/// degrades to the deterministic fallback on any service error, so the
/// pipeline always terminates with a candidate set.
pub struct AutoFallbackExtractor {
    primary: Box<dyn FieldExtraction>,
    fallback: FallbackStrategy,
}

impl AutoFallbackExtractor {
    pub fn new(primary: Box<dyn FieldExtraction>, fallback: FallbackStrategy) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl FieldExtraction for AutoFallbackExtractor {
    async fn extract(
        &self,
        schema: &DocumentTypeSchema,
        evidence: &DocumentEvidence,
    ) -> Result<CandidateSet, ServiceError> {
        match self.primary.extract(schema, evidence).await {
            Ok(set) => Ok(set),
            Err(e) => {
                warn!(error = %e, "extraction service unavailable, using fallback strategy");
                let mut set = self.fallback.extract(schema, evidence).await?;
                set.warnings
                    .push(format!("extraction service unavailable, used fallback: {}", e));
                Ok(set)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DocumentType, SchemaRegistry};

    #[test]
    fn test_align_to_schema_fills_and_orders() {
        let registry = SchemaRegistry::builtin();
        let schema = registry.schema_for(DocumentType::MedicalBill);

        let set = CandidateSet {
            fields: vec![
                FieldCandidate {
                    name: "total_amount".to_string(),
                    value: Some(FieldValue::Text("100.00".to_string())),
                    evidence: Vec::new(),
                    method: ExtractionMethod::Model,
                    confidence: 0.9,
                },
                FieldCandidate {
                    name: "not_in_schema".to_string(),
                    value: None,
                    evidence: Vec::new(),
                    method: ExtractionMethod::Model,
                    confidence: 0.9,
                },
            ],
            line_items: Vec::new(),
            warnings: Vec::new(),
        };

        let aligned = set.align_to_schema(schema, ExtractionMethod::Model);
        let names: Vec<&str> = aligned.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "invoice_number",
                "patient_name",
                "date_of_service",
                "total_amount",
                "provider_name"
            ]
        );
        // Missing fields come back as null candidates with zero confidence.
        assert!(aligned.fields[0].is_absent());
        assert_eq!(aligned.fields[0].confidence, 0.0);
    }

    #[test]
    fn test_field_value_untagged_serialization() {
        let amount = FieldValue::Amount("125.00".parse().unwrap());
        assert_eq!(serde_json::to_string(&amount).unwrap(), "\"125.00\"");

        let date = FieldValue::Date(chrono::NaiveDate::from_ymd_opt(2025, 2, 10).unwrap());
        assert_eq!(serde_json::to_string(&date).unwrap(), "\"2025-02-10\"");
    }
}

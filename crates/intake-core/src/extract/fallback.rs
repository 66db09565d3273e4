//! Deterministic pattern-based extraction.
//!
//! Applies each field definition's label-proximity regex over the joined
//! evidence text and links matches back to tokens through the offset
//! index. Confidences are capped below the model strategy's range so
//! scoring can distinguish provenance downstream.

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::error::ServiceError;
use crate::evidence::{DocumentEvidence, EvidenceRef};
use crate::schema::{DocumentTypeSchema, FieldDef, FieldKind};

use super::rules::{parse_amount, parse_date, LINE_ITEM_ROW};
use super::{
    CandidateSet, ExtractionMethod, FieldCandidate, FieldExtraction, FieldValue, LineItemCandidate,
};

/// Baseline confidence for a pattern hit, before the ceiling applies.
const FOUND_CONFIDENCE: f32 = 0.55;

/// Confidence for pattern-extracted line item rows.
const LINE_ITEM_CONFIDENCE: f32 = 0.5;

/// Row cap for the line-item scan.
const MAX_LINE_ITEMS: usize = 20;

/// Deterministic fallback strategy. Always terminates with a complete
/// candidate set; never contacts the network.
pub struct FallbackStrategy {
    ceiling: f32,
}

impl FallbackStrategy {
    /// `ceiling` caps every confidence this strategy emits.
    pub fn new(ceiling: f32) -> Self {
        Self { ceiling }
    }

    fn extract_field(&self, def: &FieldDef, evidence: &DocumentEvidence) -> FieldCandidate {
        let Ok(re) = Regex::new(def.pattern) else {
            return FieldCandidate::missing(def.name, ExtractionMethod::Fallback);
        };

        let Some(caps) = re.captures(evidence.full_text()) else {
            return FieldCandidate::missing(def.name, ExtractionMethod::Fallback);
        };

        let whole = caps.get(0).expect("group 0 always present");
        let group = caps.get(1).unwrap_or(whole);
        let raw = group.as_str().trim();

        let evidence_ref = match evidence.token_at_offset(group.start()) {
            Some((page, token)) => EvidenceRef::located(whole.as_str().trim(), page, token),
            None => EvidenceRef::quote_only(whole.as_str().trim()),
        };

        FieldCandidate {
            name: def.name.to_string(),
            value: Some(coerce_value(def.kind, raw)),
            evidence: vec![evidence_ref],
            method: ExtractionMethod::Fallback,
            confidence: FOUND_CONFIDENCE.min(self.ceiling),
        }
    }

    fn extract_line_items(&self, evidence: &DocumentEvidence) -> Vec<LineItemCandidate> {
        LINE_ITEM_ROW
            .captures_iter(evidence.full_text())
            .take(MAX_LINE_ITEMS)
            .map(|caps| {
                let whole = caps.get(0).expect("group 0 always present");
                let evidence_ref = match evidence.token_at_offset(whole.start()) {
                    Some((page, token)) => EvidenceRef::located(whole.as_str().trim(), page, token),
                    None => EvidenceRef::quote_only(whole.as_str().trim()),
                };
                LineItemCandidate {
                    service: Some(caps[1].trim().to_string()),
                    code: Some(caps[2].trim().to_string()),
                    amount: parse_amount(&caps[3]),
                    confidence: LINE_ITEM_CONFIDENCE.min(self.ceiling),
                    evidence: vec![evidence_ref],
                    method: ExtractionMethod::Fallback,
                }
            })
            .collect()
    }
}

/// Coerce raw matched text into the field's expected shape where it
/// parses; otherwise keep the text so validation can flag it without
/// losing the original value.
fn coerce_value(kind: FieldKind, raw: &str) -> FieldValue {
    match kind {
        FieldKind::Amount => parse_amount(raw)
            .map(FieldValue::Amount)
            .unwrap_or_else(|| FieldValue::Text(raw.to_string())),
        FieldKind::Date => parse_date(raw)
            .map(FieldValue::Date)
            .unwrap_or_else(|| FieldValue::Text(raw.to_string())),
        FieldKind::Identifier | FieldKind::Name => FieldValue::Text(raw.to_string()),
    }
}

#[async_trait]
impl FieldExtraction for FallbackStrategy {
    async fn extract(
        &self,
        schema: &DocumentTypeSchema,
        evidence: &DocumentEvidence,
    ) -> Result<CandidateSet, ServiceError> {
        let fields: Vec<FieldCandidate> = schema
            .fields
            .iter()
            .map(|def| self.extract_field(def, evidence))
            .collect();

        let found = fields.iter().filter(|f| !f.is_absent()).count();
        debug!(
            found,
            total = fields.len(),
            "fallback extraction finished"
        );

        Ok(CandidateSet {
            fields,
            line_items: self.extract_line_items(evidence),
            warnings: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::{BoundingBox, EvidenceUnit, PageEvidence};
    use crate::schema::{DocumentType, SchemaRegistry};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn evidence_from_lines(lines: &[&[&str]]) -> DocumentEvidence {
        let mut tokens = Vec::new();
        for (line_index, line) in lines.iter().enumerate() {
            for (word_index, word) in line.iter().enumerate() {
                tokens.push(EvidenceUnit {
                    text: word.to_string(),
                    bbox: BoundingBox::new(
                        word_index as f32 * 120.0,
                        line_index as f32 * 24.0,
                        100.0,
                        12.0,
                    ),
                    page_index: 0,
                    confidence: 0.95,
                });
            }
        }
        DocumentEvidence::new(
            vec![PageEvidence {
                page_index: 0,
                dimensions: (2000, 1000),
                tokens,
            }],
            Vec::new(),
        )
    }

    fn claim_evidence() -> DocumentEvidence {
        evidence_from_lines(&[
            &["Acme", "Insurance"],
            &["Claim", "Number:", "CLM-2025-0042"],
            &["Claimant", "Name:", "Jane", "Doe"],
            &["Date", "of", "Service:", "02/10/2025"],
            &["Total", "Amount:", "$1,820.55"],
            &["Provider:", "City", "Hospital"],
            &["Policy", "Number:", "POL-777"],
        ])
    }

    #[tokio::test]
    async fn test_extracts_claim_fields() {
        let registry = SchemaRegistry::builtin();
        let schema = registry.schema_for(DocumentType::InsuranceClaim);
        let evidence = claim_evidence();

        let strategy = FallbackStrategy::new(0.6);
        let set = strategy.extract(schema, &evidence).await.unwrap();

        let claim = set.fields.iter().find(|f| f.name == "claim_number").unwrap();
        assert_eq!(
            claim.value,
            Some(FieldValue::Text("CLM-2025-0042".to_string()))
        );
        assert_eq!(claim.method, ExtractionMethod::Fallback);
        // The match links back to a real token.
        assert!(claim.evidence[0].token_index.is_some());

        let total = set.fields.iter().find(|f| f.name == "total_amount").unwrap();
        assert_eq!(
            total.value,
            Some(FieldValue::Amount(Decimal::from_str("1820.55").unwrap()))
        );

        let date = set
            .fields
            .iter()
            .find(|f| f.name == "date_of_service")
            .unwrap();
        assert_eq!(
            date.value,
            Some(FieldValue::Date(
                chrono::NaiveDate::from_ymd_opt(2025, 2, 10).unwrap()
            ))
        );
    }

    #[tokio::test]
    async fn test_confidence_never_exceeds_ceiling() {
        let registry = SchemaRegistry::builtin();
        let schema = registry.schema_for(DocumentType::InsuranceClaim);
        let evidence = claim_evidence();

        let strategy = FallbackStrategy::new(0.4);
        let set = strategy.extract(schema, &evidence).await.unwrap();

        for field in &set.fields {
            assert!(field.confidence <= 0.4, "field {} over ceiling", field.name);
        }
        for item in &set.line_items {
            assert!(item.confidence <= 0.4);
        }
    }

    #[tokio::test]
    async fn test_unfound_fields_are_null_with_zero_confidence() {
        let registry = SchemaRegistry::builtin();
        let schema = registry.schema_for(DocumentType::InsuranceClaim);
        let evidence = evidence_from_lines(&[&["nothing", "relevant", "here"]]);

        let strategy = FallbackStrategy::new(0.6);
        let set = strategy.extract(schema, &evidence).await.unwrap();

        assert_eq!(set.fields.len(), schema.fields.len());
        for field in &set.fields {
            assert!(field.is_absent());
            assert_eq!(field.confidence, 0.0);
            assert!(field.evidence.is_empty());
        }
    }

    #[tokio::test]
    async fn test_line_item_rows() {
        let registry = SchemaRegistry::builtin();
        let schema = registry.schema_for(DocumentType::MedicalBill);
        let evidence = evidence_from_lines(&[
            &["Itemized", "services"],
            &["Blood", "Panel", "80050", "$125.00"],
            &["Office", "Visit", "99213", "$150.00"],
        ]);

        let strategy = FallbackStrategy::new(0.6);
        let set = strategy.extract(schema, &evidence).await.unwrap();

        assert_eq!(set.line_items.len(), 2);
        assert_eq!(set.line_items[0].code.as_deref(), Some("80050"));
        assert_eq!(
            set.line_items[1].amount,
            Some(Decimal::from_str("150.00").unwrap())
        );
    }
}

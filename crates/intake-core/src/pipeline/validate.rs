//! Type and format validation of candidate values.
//!
//! Validation annotates, never rewrites: the raw extracted value survives
//! unchanged next to its validity flag and violation reasons. Absent
//! values are valid-but-absent, a different thing from present-but-
//! malformed; the router cares about the distinction for critical fields.

use serde::{Deserialize, Serialize};

use crate::extract::rules::{parse_amount, parse_date, CODE_SHAPE, IDENTIFIER_SHAPE, NAME_SHAPE};
use crate::extract::{FieldCandidate, FieldValue, LineItemCandidate};
use crate::schema::{DocumentTypeSchema, FieldKind};

/// Why a present value failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Violation {
    /// The value does not match the expected format for its kind.
    FormatMismatch,
    /// The value parses but falls outside the allowed range.
    OutOfRange,
    /// The value's type does not fit the field definition at all.
    TypeMismatch,
}

/// A field candidate annotated with its validation outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedField {
    pub candidate: FieldCandidate,

    /// True when the value is well-formed or absent.
    pub valid: bool,

    pub violations: Vec<Violation>,
}

impl ValidatedField {
    pub fn is_absent(&self) -> bool {
        self.candidate.is_absent()
    }
}

/// Validation outcome for one line-item sub-field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubFieldValidation {
    pub absent: bool,
    pub valid: bool,
    pub violations: Vec<Violation>,
}

impl SubFieldValidation {
    fn absent() -> Self {
        Self {
            absent: true,
            valid: true,
            violations: Vec::new(),
        }
    }

    fn valid() -> Self {
        Self {
            absent: false,
            valid: true,
            violations: Vec::new(),
        }
    }

    fn invalid(violation: Violation) -> Self {
        Self {
            absent: false,
            valid: false,
            violations: vec![violation],
        }
    }
}

/// A line-item candidate annotated per sub-field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedLineItem {
    pub candidate: LineItemCandidate,
    pub service: SubFieldValidation,
    pub code: SubFieldValidation,
    pub amount: SubFieldValidation,
}

/// Validate every candidate against its schema definition, in schema
/// order. Candidates without a definition fail closed as type mismatches.
pub fn validate_fields(
    schema: &DocumentTypeSchema,
    candidates: Vec<FieldCandidate>,
) -> Vec<ValidatedField> {
    candidates
        .into_iter()
        .map(|candidate| match schema.field(&candidate.name) {
            Some(def) => validate_field(def.kind, candidate),
            None => ValidatedField {
                candidate,
                valid: false,
                violations: vec![Violation::TypeMismatch],
            },
        })
        .collect()
}

fn validate_field(kind: FieldKind, candidate: FieldCandidate) -> ValidatedField {
    if candidate.is_absent() {
        return ValidatedField {
            candidate,
            valid: true,
            violations: Vec::new(),
        };
    }

    let violations = match candidate.value.as_ref() {
        None => Vec::new(),
        Some(value) => check_value(kind, value),
    };

    ValidatedField {
        valid: violations.is_empty(),
        violations,
        candidate,
    }
}

fn check_value(kind: FieldKind, value: &FieldValue) -> Vec<Violation> {
    match (kind, value) {
        (FieldKind::Identifier, FieldValue::Text(s)) => {
            if IDENTIFIER_SHAPE.is_match(s.trim()) {
                Vec::new()
            } else {
                vec![Violation::FormatMismatch]
            }
        }
        (FieldKind::Name, FieldValue::Text(s)) => {
            if NAME_SHAPE.is_match(s.trim()) {
                Vec::new()
            } else {
                vec![Violation::FormatMismatch]
            }
        }
        (FieldKind::Date, FieldValue::Date(_)) => Vec::new(),
        (FieldKind::Date, FieldValue::Text(s)) => {
            // Re-parse so validation stands alone from extractor coercion.
            if parse_date(s).is_some() {
                Vec::new()
            } else {
                vec![Violation::FormatMismatch]
            }
        }
        (FieldKind::Amount, FieldValue::Amount(d)) => {
            if d.is_sign_negative() {
                vec![Violation::OutOfRange]
            } else {
                Vec::new()
            }
        }
        (FieldKind::Amount, FieldValue::Text(s)) => match parse_amount(s) {
            Some(d) if d.is_sign_negative() => vec![Violation::OutOfRange],
            Some(_) => Vec::new(),
            None => vec![Violation::FormatMismatch],
        },
        // A value of a shape the field kind cannot hold.
        _ => vec![Violation::TypeMismatch],
    }
}

/// Validate each line item's service, code, and amount sub-fields.
pub fn validate_line_items(candidates: Vec<LineItemCandidate>) -> Vec<ValidatedLineItem> {
    candidates.into_iter().map(validate_line_item).collect()
}

fn validate_line_item(candidate: LineItemCandidate) -> ValidatedLineItem {
    let service = match candidate.service.as_deref().map(str::trim) {
        None | Some("") => SubFieldValidation::absent(),
        Some(_) => SubFieldValidation::valid(),
    };

    let code = match candidate.code.as_deref().map(str::trim) {
        None | Some("") => SubFieldValidation::absent(),
        Some(c) if CODE_SHAPE.is_match(c) => SubFieldValidation::valid(),
        Some(_) => SubFieldValidation::invalid(Violation::FormatMismatch),
    };

    let amount = match candidate.amount {
        None => SubFieldValidation::absent(),
        Some(d) if d.is_sign_negative() => SubFieldValidation::invalid(Violation::OutOfRange),
        Some(_) => SubFieldValidation::valid(),
    };

    ValidatedLineItem {
        candidate,
        service,
        code,
        amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractionMethod;
    use crate::schema::{DocumentType, SchemaRegistry};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn candidate(name: &str, value: Option<FieldValue>) -> FieldCandidate {
        FieldCandidate {
            name: name.to_string(),
            value,
            evidence: Vec::new(),
            method: ExtractionMethod::Fallback,
            confidence: 0.55,
        }
    }

    fn validate_one(name: &str, value: Option<FieldValue>) -> ValidatedField {
        let registry = SchemaRegistry::builtin();
        let schema = registry.schema_for(DocumentType::InsuranceClaim);
        validate_fields(schema, vec![candidate(name, value)])
            .into_iter()
            .next()
            .unwrap()
    }

    #[test]
    fn test_absent_is_valid_but_absent() {
        let validated = validate_one("claim_number", None);
        assert!(validated.valid);
        assert!(validated.is_absent());
        assert!(validated.violations.is_empty());
    }

    #[test]
    fn test_malformed_date_is_present_and_invalid() {
        let validated = validate_one(
            "date_of_service",
            Some(FieldValue::Text("febtober 32nd".to_string())),
        );
        assert!(!validated.valid);
        assert!(!validated.is_absent());
        assert_eq!(validated.violations, vec![Violation::FormatMismatch]);
        // Raw value untouched.
        assert_eq!(
            validated.candidate.value,
            Some(FieldValue::Text("febtober 32nd".to_string()))
        );
    }

    #[test]
    fn test_negative_amount_out_of_range() {
        let validated = validate_one(
            "total_amount",
            Some(FieldValue::Amount(Decimal::from_str("-10.00").unwrap())),
        );
        assert_eq!(validated.violations, vec![Violation::OutOfRange]);
    }

    #[test]
    fn test_valid_identifier_and_name() {
        assert!(
            validate_one(
                "claim_number",
                Some(FieldValue::Text("CLM-2025-0042".to_string()))
            )
            .valid
        );
        assert!(
            validate_one("claimant_name", Some(FieldValue::Text("Jane Doe".to_string()))).valid
        );
        assert!(
            !validate_one(
                "claim_number",
                Some(FieldValue::Text("not an id!".to_string()))
            )
            .valid
        );
    }

    #[test]
    fn test_wrong_value_shape_is_type_mismatch() {
        let validated = validate_one(
            "claimant_name",
            Some(FieldValue::Amount(Decimal::from_str("5.00").unwrap())),
        );
        assert_eq!(validated.violations, vec![Violation::TypeMismatch]);
    }

    #[test]
    fn test_line_item_sub_fields() {
        let item = LineItemCandidate {
            service: Some("Blood Panel".to_string()),
            code: Some("80050".to_string()),
            amount: Some(Decimal::from_str("-5.00").unwrap()),
            confidence: 0.5,
            evidence: Vec::new(),
            method: ExtractionMethod::Fallback,
        };
        let validated = validate_line_item(item);
        assert!(validated.service.valid && !validated.service.absent);
        assert!(validated.code.valid);
        assert!(!validated.amount.valid);
        assert_eq!(validated.amount.violations, vec![Violation::OutOfRange]);

        let empty = validate_line_item(LineItemCandidate {
            service: None,
            code: None,
            amount: None,
            confidence: 0.5,
            evidence: Vec::new(),
            method: ExtractionMethod::Fallback,
        });
        assert!(empty.service.absent && empty.code.absent && empty.amount.absent);
    }
}

//! Document-type schema registry.
//!
//! Read-only registry data: built once at process start, passed by
//! reference into every pipeline run, safe for unsynchronized concurrent
//! reads.

mod resolve;

pub use resolve::resolve_document_type;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::config::IntakeConfig;

/// Closed set of supported document types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    InsuranceClaim,
    MedicalBill,
}

impl DocumentType {
    pub const ALL: [DocumentType; 2] = [DocumentType::InsuranceClaim, DocumentType::MedicalBill];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::InsuranceClaim => "insurance_claim",
            DocumentType::MedicalBill => "medical_bill",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "insurance_claim" => Ok(DocumentType::InsuranceClaim),
            "medical_bill" => Ok(DocumentType::MedicalBill),
            _ => Err(()),
        }
    }
}

/// Expected shape of a field's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Alphanumeric identifier (claim number, policy number, ...).
    Identifier,
    /// Person or organization name.
    Name,
    /// Calendar date.
    Date,
    /// Monetary amount.
    Amount,
}

/// Definition of one expected field.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Field name as it appears in extraction output.
    pub name: &'static str,

    /// Expected value shape, drives validation.
    pub kind: FieldKind,

    /// Absence or invalidity of a critical field forces review.
    pub critical: bool,

    /// Label-proximity pattern for the fallback strategy. Group 1 captures
    /// the value.
    pub pattern: &'static str,
}

impl FieldDef {
    const fn new(
        name: &'static str,
        kind: FieldKind,
        critical: bool,
        pattern: &'static str,
    ) -> Self {
        Self {
            name,
            kind,
            critical,
            pattern,
        }
    }
}

/// Schema for one document type. Line items share a fixed sub-field
/// shape (service description, billing code, amount) across types.
#[derive(Debug, Clone)]
pub struct DocumentTypeSchema {
    pub document_type: DocumentType,
    pub fields: Vec<FieldDef>,
}

impl DocumentTypeSchema {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Names of fields whose absence or invalidity forces review.
    pub fn critical_field_names(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|f| f.critical)
            .map(|f| f.name)
            .collect()
    }
}

const INSURANCE_CLAIM_FIELDS: &[FieldDef] = &[
    FieldDef::new(
        "claim_number",
        FieldKind::Identifier,
        true,
        r"(?i)claim\s*(?:number|#)?\s*[:\-]?\s*([A-Z0-9\-]+)",
    ),
    FieldDef::new(
        "claimant_name",
        FieldKind::Name,
        false,
        r"(?i)claimant(?:\s+name)?\s*[:\-]?\s*([A-Za-z ,.'-]+)",
    ),
    FieldDef::new(
        "date_of_service",
        FieldKind::Date,
        true,
        r"(?i)date\s+of\s+service\s*[:\-]?\s*([0-9/\-]{6,12})",
    ),
    FieldDef::new(
        "total_amount",
        FieldKind::Amount,
        true,
        r"(?i)total(?:\s+amount)?\s*[:\-]?\s*(\$?[0-9,]+\.[0-9]{2})",
    ),
    FieldDef::new(
        "provider_name",
        FieldKind::Name,
        false,
        r"(?i)provider(?:\s+name)?\s*[:\-]?\s*([A-Za-z0-9 ,.'-]+)",
    ),
    FieldDef::new(
        "policy_number",
        FieldKind::Identifier,
        false,
        r"(?i)policy\s*(?:number|#)?\s*[:\-]?\s*([A-Z0-9\-]+)",
    ),
];

const MEDICAL_BILL_FIELDS: &[FieldDef] = &[
    FieldDef::new(
        "invoice_number",
        FieldKind::Identifier,
        true,
        r"(?i)invoice\s*(?:number|#)?\s*[:\-]?\s*([A-Z0-9\-]+)",
    ),
    FieldDef::new(
        "patient_name",
        FieldKind::Name,
        false,
        r"(?i)patient(?:\s+name)?\s*[:\-]?\s*([A-Za-z ,.'-]+)",
    ),
    FieldDef::new(
        "date_of_service",
        FieldKind::Date,
        true,
        r"(?i)date\s+of\s+service\s*[:\-]?\s*([0-9/\-]{6,12})",
    ),
    FieldDef::new(
        "total_amount",
        FieldKind::Amount,
        true,
        r"(?i)total(?:\s+amount)?\s*[:\-]?\s*(\$?[0-9,]+\.[0-9]{2})",
    ),
    FieldDef::new(
        "provider_name",
        FieldKind::Name,
        false,
        r"(?i)provider(?:\s+name)?\s*[:\-]?\s*([A-Za-z0-9 ,.'-]+)",
    ),
];

/// Immutable schema lookup, one entry per supported document type.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: HashMap<DocumentType, DocumentTypeSchema>,
}

impl SchemaRegistry {
    /// Registry with the built-in field definitions.
    pub fn builtin() -> Self {
        let mut schemas = HashMap::new();
        schemas.insert(
            DocumentType::InsuranceClaim,
            DocumentTypeSchema {
                document_type: DocumentType::InsuranceClaim,
                fields: INSURANCE_CLAIM_FIELDS.to_vec(),
            },
        );
        schemas.insert(
            DocumentType::MedicalBill,
            DocumentTypeSchema {
                document_type: DocumentType::MedicalBill,
                fields: MEDICAL_BILL_FIELDS.to_vec(),
            },
        );
        Self { schemas }
    }

    /// Built-in registry with critical-field overrides from config. An
    /// override replaces the critical set for that document type; field
    /// names not in the schema are ignored.
    pub fn from_config(config: &IntakeConfig) -> Self {
        let mut registry = Self::builtin();
        for (type_name, criticals) in &config.critical_fields {
            let Ok(doc_type) = DocumentType::from_str(type_name) else {
                continue;
            };
            if let Some(schema) = registry.schemas.get_mut(&doc_type) {
                for field in &mut schema.fields {
                    field.critical = criticals.iter().any(|c| c == field.name);
                }
            }
        }
        registry
    }

    pub fn schema_for(&self, document_type: DocumentType) -> &DocumentTypeSchema {
        // Both members of the closed set are inserted at construction.
        &self.schemas[&document_type]
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_critical_fields() {
        let registry = SchemaRegistry::builtin();
        let claim = registry.schema_for(DocumentType::InsuranceClaim);
        assert_eq!(
            claim.critical_field_names(),
            vec!["claim_number", "date_of_service", "total_amount"]
        );

        let bill = registry.schema_for(DocumentType::MedicalBill);
        assert_eq!(
            bill.critical_field_names(),
            vec!["invoice_number", "date_of_service", "total_amount"]
        );
    }

    #[test]
    fn test_config_overrides_critical_set() {
        let mut config = IntakeConfig::default();
        config.critical_fields.insert(
            "insurance_claim".to_string(),
            vec!["claim_number".to_string(), "policy_number".to_string()],
        );
        let registry = SchemaRegistry::from_config(&config);
        let claim = registry.schema_for(DocumentType::InsuranceClaim);
        assert_eq!(
            claim.critical_field_names(),
            vec!["claim_number", "policy_number"]
        );
        // The other schema keeps its defaults.
        let bill = registry.schema_for(DocumentType::MedicalBill);
        assert_eq!(bill.critical_field_names().len(), 3);
    }

    #[test]
    fn test_document_type_roundtrip() {
        for doc_type in DocumentType::ALL {
            assert_eq!(DocumentType::from_str(doc_type.as_str()), Ok(doc_type));
        }
        assert!(DocumentType::from_str("receipt").is_err());
    }
}

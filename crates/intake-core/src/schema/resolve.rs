//! Document type resolution.
//!
//! An explicit caller hint wins. Otherwise keyword signals are counted
//! over the lowercased evidence text; a strict majority resolves, and a
//! tie or an absence of signals is an error rather than a silent guess.

use std::str::FromStr;

use tracing::debug;

use crate::error::TypeResolutionError;

use super::DocumentType;

const INSURANCE_SIGNALS: &[&str] = &["claim", "policy", "claimant", "insurance"];
const MEDICAL_SIGNALS: &[&str] = &["invoice", "cpt", "medical", "patient", "provider bill"];

/// Resolve the document type from a caller hint or evidence text.
pub fn resolve_document_type(
    hint: Option<&str>,
    text: &str,
) -> Result<DocumentType, TypeResolutionError> {
    if let Some(hint) = hint {
        return DocumentType::from_str(hint)
            .map_err(|_| TypeResolutionError::UnknownHint(hint.to_string()));
    }

    let normalized = text.to_lowercase();
    let insurance = INSURANCE_SIGNALS
        .iter()
        .filter(|s| normalized.contains(*s))
        .count();
    let medical = MEDICAL_SIGNALS
        .iter()
        .filter(|s| normalized.contains(*s))
        .count();

    debug!(insurance, medical, "document type signal counts");

    if insurance == 0 && medical == 0 {
        return Err(TypeResolutionError::NoSignals);
    }
    match insurance.cmp(&medical) {
        std::cmp::Ordering::Greater => Ok(DocumentType::InsuranceClaim),
        std::cmp::Ordering::Less => Ok(DocumentType::MedicalBill),
        std::cmp::Ordering::Equal => Err(TypeResolutionError::Ambiguous { insurance, medical }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hint_wins_over_signals() {
        let resolved = resolve_document_type(Some("medical_bill"), "claim policy claimant");
        assert_eq!(resolved.unwrap(), DocumentType::MedicalBill);
    }

    #[test]
    fn test_unknown_hint_is_an_error() {
        let err = resolve_document_type(Some("receipt"), "").unwrap_err();
        assert!(matches!(err, TypeResolutionError::UnknownHint(_)));
    }

    #[test]
    fn test_signal_majority_resolves() {
        let claim = resolve_document_type(None, "Claim Number: C-1 Policy: P-9").unwrap();
        assert_eq!(claim, DocumentType::InsuranceClaim);

        let bill = resolve_document_type(None, "Invoice for patient John, CPT 80050").unwrap();
        assert_eq!(bill, DocumentType::MedicalBill);
    }

    #[test]
    fn test_no_signals_is_an_error() {
        let err = resolve_document_type(None, "completely unrelated text").unwrap_err();
        assert!(matches!(err, TypeResolutionError::NoSignals));
    }

    #[test]
    fn test_tied_signals_are_ambiguous() {
        let err = resolve_document_type(None, "insurance invoice").unwrap_err();
        assert!(matches!(
            err,
            TypeResolutionError::Ambiguous {
                insurance: 1,
                medical: 1
            }
        ));
    }
}

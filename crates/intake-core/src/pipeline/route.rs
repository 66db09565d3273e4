//! Review routing.
//!
//! A pure function over the scored fields, the schema, and the document
//! confidence. It never re-runs extraction or scoring.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::schema::DocumentTypeSchema;

use super::score::ScoredField;

/// Closed set of routing outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingDecision {
    AutoApproved,
    PendingReview,
}

/// Critical fields whose value is absent or failed validation. Both
/// count as missing: a malformed claim number forces review just like a
/// missing one.
pub fn missing_critical_fields(
    schema: &DocumentTypeSchema,
    fields: &[ScoredField],
) -> Vec<String> {
    schema
        .critical_field_names()
        .into_iter()
        .filter(|name| {
            fields
                .iter()
                .find(|f| f.field.candidate.name == *name)
                .map(|f| f.field.is_absent() || !f.field.valid)
                // A critical field with no candidate at all is missing.
                .unwrap_or(true)
        })
        .map(String::from)
        .collect()
}

/// Decide the routing outcome. Evaluation order: critical-field
/// completeness first, then the confidence threshold.
pub fn route(
    schema: &DocumentTypeSchema,
    fields: &[ScoredField],
    document_confidence: f32,
    threshold: f32,
) -> (RoutingDecision, Vec<String>) {
    let missing = missing_critical_fields(schema, fields);

    let decision = if !missing.is_empty() {
        RoutingDecision::PendingReview
    } else if document_confidence < threshold {
        RoutingDecision::PendingReview
    } else {
        RoutingDecision::AutoApproved
    };

    debug!(
        ?decision,
        document_confidence,
        missing = missing.len(),
        "routing decided"
    );

    (decision, missing)
}

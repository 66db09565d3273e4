//! Confidence scoring.
//!
//! Per field: `score = extraction_confidence x validity_multiplier`, where
//! the multiplier is 1.0 for valid values, a configured penalty for
//! invalid ones, and 0.0 for absent ones. Line items apply the same
//! formula per sub-field and average. The document score weights header
//! fields over line items; with no line items the weight redistributes
//! entirely to fields rather than contributing a phantom zero.

use serde::{Deserialize, Serialize};

use super::validate::{SubFieldValidation, ValidatedField, ValidatedLineItem};

/// A validated field with its final confidence score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredField {
    #[serde(flatten)]
    pub field: ValidatedField,

    /// Final confidence (0.0 - 1.0).
    pub score: f32,
}

/// A validated line item with its final confidence score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredLineItem {
    #[serde(flatten)]
    pub item: ValidatedLineItem,

    /// Final confidence (0.0 - 1.0).
    pub score: f32,
}

fn multiplier(absent: bool, valid: bool, penalty: f32) -> f32 {
    if absent {
        0.0
    } else if valid {
        1.0
    } else {
        penalty
    }
}

/// Score one validated field.
pub fn score_field(field: &ValidatedField, penalty: f32) -> f32 {
    let m = multiplier(field.is_absent(), field.valid, penalty);
    (field.candidate.confidence * m).clamp(0.0, 1.0)
}

/// Score one line item: the field formula applied to each sub-field,
/// averaged.
pub fn score_line_item(item: &ValidatedLineItem, penalty: f32) -> f32 {
    let subs: [&SubFieldValidation; 3] = [&item.service, &item.code, &item.amount];
    let total: f32 = subs
        .iter()
        .map(|s| item.candidate.confidence * multiplier(s.absent, s.valid, penalty))
        .sum();
    (total / subs.len() as f32).clamp(0.0, 1.0)
}

pub fn score_fields(fields: Vec<ValidatedField>, penalty: f32) -> Vec<ScoredField> {
    fields
        .into_iter()
        .map(|field| ScoredField {
            score: score_field(&field, penalty),
            field,
        })
        .collect()
}

pub fn score_line_items(items: Vec<ValidatedLineItem>, penalty: f32) -> Vec<ScoredLineItem> {
    items
        .into_iter()
        .map(|item| ScoredLineItem {
            score: score_line_item(&item, penalty),
            item,
        })
        .collect()
}

fn mean(scores: impl Iterator<Item = f32>, len: usize) -> f32 {
    if len == 0 {
        0.0
    } else {
        scores.sum::<f32>() / len as f32
    }
}

/// Weighted document-level confidence, clamped to [0,1] and rounded to
/// four decimals so repeated runs serialize identically.
pub fn document_confidence(
    fields: &[ScoredField],
    line_items: &[ScoredLineItem],
    field_weight: f32,
) -> f32 {
    let field_mean = mean(fields.iter().map(|f| f.score), fields.len());

    let weighted = if line_items.is_empty() {
        field_mean
    } else {
        let item_mean = mean(line_items.iter().map(|i| i.score), line_items.len());
        field_weight * field_mean + (1.0 - field_weight) * item_mean
    };

    (weighted.clamp(0.0, 1.0) * 10_000.0).round() / 10_000.0
}

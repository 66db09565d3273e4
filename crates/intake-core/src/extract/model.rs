//! Model-based structured extraction.
//!
//! Builds a schema-guided prompt over the evidence text, calls the
//! external service under a bounded timeout, and maps the returned values
//! back onto evidence tokens. Every failure mode (transport, timeout,
//! malformed or schema-violating payload) surfaces as a [`ServiceError`]
//! for the fallback wrapper to absorb.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::error::ServiceError;
use crate::evidence::{DocumentEvidence, EvidenceRef};
use crate::models::config::ServiceConfig;
use crate::schema::{DocumentTypeSchema, FieldKind};

use super::rules::{parse_amount, parse_date};
use super::service::{ExtractionService, RawField, RawLineItem, ServicePayload};
use super::{
    CandidateSet, ExtractionMethod, FieldCandidate, FieldExtraction, FieldValue, LineItemCandidate,
};

/// Structured extraction through an external model service.
pub struct ModelStrategy {
    service: Arc<dyn ExtractionService>,
    timeout: Duration,
    max_retries: u32,
    max_context_chars: usize,
}

impl ModelStrategy {
    pub fn new(service: Arc<dyn ExtractionService>, config: &ServiceConfig) -> Self {
        Self {
            service,
            timeout: Duration::from_millis(config.timeout_ms),
            max_retries: config.max_retries,
            max_context_chars: config.max_context_chars,
        }
    }

    fn build_prompt(&self, schema: &DocumentTypeSchema, context: &str) -> String {
        let field_names: Vec<&str> = schema.fields.iter().map(|f| f.name).collect();
        format!(
            "You are extracting structured data from OCR output of a {doc_type} document.\n\
             Return JSON only with this format:\n\
             {{\n\
             \x20 \"document_type\": \"{doc_type}\",\n\
             \x20 \"fields\": {{\n\
             \x20   \"<field_name>\": {{\"value\": \"...\", \"confidence\": 0.0-1.0, \"quote\": \"short source text\"}}\n\
             \x20 }},\n\
             \x20 \"line_items\": [\n\
             \x20   {{\"service\": \"...\", \"code\": \"...\", \"amount\": 0.0, \"confidence\": 0.0-1.0, \"quote\": \"short source text\"}}\n\
             \x20 ]\n\
             }}\n\
             Use exactly these field names: {fields}\n\n\
             OCR TEXT:\n{context}",
            doc_type = schema.document_type,
            fields = field_names.join(", "),
        )
    }

    /// Call the service under the configured deadline, with bounded
    /// retries. The fallback transition happens above this layer.
    async fn call_service(&self, prompt: &str) -> Result<ServicePayload, ServiceError> {
        let attempts = self.max_retries.saturating_add(1);
        let mut last_error = ServiceError::Timeout;

        for attempt in 1..=attempts {
            match tokio::time::timeout(self.timeout, self.service.extract(prompt)).await {
                Ok(Ok(payload)) => return Ok(payload),
                Ok(Err(e)) => {
                    warn!(attempt, error = %e, "extraction service call failed");
                    last_error = e;
                }
                Err(_) => {
                    warn!(attempt, "extraction service call timed out");
                    last_error = ServiceError::Timeout;
                }
            }
        }

        Err(last_error)
    }

    fn coerce_field(
        &self,
        name: &str,
        kind: FieldKind,
        raw: &RawField,
        evidence: &DocumentEvidence,
    ) -> FieldCandidate {
        FieldCandidate {
            name: name.to_string(),
            value: coerce_value(kind, &raw.value),
            evidence: quote_evidence(raw.quote.as_deref(), evidence),
            method: ExtractionMethod::Model,
            confidence: raw.confidence.clamp(0.0, 1.0) as f32,
        }
    }

    fn coerce_line_item(&self, raw: &RawLineItem, evidence: &DocumentEvidence) -> LineItemCandidate {
        LineItemCandidate {
            service: raw.service.clone().filter(|s| !s.trim().is_empty()),
            code: raw.code.clone().filter(|s| !s.trim().is_empty()),
            amount: json_amount(&raw.amount),
            confidence: raw.confidence.clamp(0.0, 1.0) as f32,
            evidence: quote_evidence(raw.quote.as_deref(), evidence),
            method: ExtractionMethod::Model,
        }
    }
}

/// Coerce a JSON value into the field's expected shape where it parses;
/// unparseable text is kept as-is for validation to flag.
fn coerce_value(kind: FieldKind, value: &serde_json::Value) -> Option<FieldValue> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) if s.trim().is_empty() => None,
        serde_json::Value::Number(n) => match kind {
            FieldKind::Amount => parse_amount(&n.to_string())
                .map(FieldValue::Amount)
                .or_else(|| Some(FieldValue::Text(n.to_string()))),
            _ => Some(FieldValue::Text(n.to_string())),
        },
        serde_json::Value::String(s) => {
            let s = s.trim();
            Some(match kind {
                FieldKind::Amount => parse_amount(s)
                    .map(FieldValue::Amount)
                    .unwrap_or_else(|| FieldValue::Text(s.to_string())),
                FieldKind::Date => parse_date(s)
                    .map(FieldValue::Date)
                    .unwrap_or_else(|| FieldValue::Text(s.to_string())),
                FieldKind::Identifier | FieldKind::Name => FieldValue::Text(s.to_string()),
            })
        }
        other => Some(FieldValue::Text(other.to_string())),
    }
}

fn json_amount(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::Number(n) => parse_amount(&n.to_string()),
        serde_json::Value::String(s) => parse_amount(s),
        _ => None,
    }
}

/// Link a returned source quote to the closest evidence token: last
/// `:`-separated segment, first word, matched case-insensitively with
/// surrounding punctuation trimmed.
fn quote_evidence(quote: Option<&str>, evidence: &DocumentEvidence) -> Vec<EvidenceRef> {
    let Some(quote) = quote.map(str::trim).filter(|q| !q.is_empty()) else {
        return Vec::new();
    };

    let probe = quote
        .rsplit(':')
        .next()
        .unwrap_or(quote)
        .split_whitespace()
        .next()
        .unwrap_or("");

    match evidence.find_token(probe) {
        Some((page, token)) => vec![EvidenceRef::located(quote, page, token)],
        None => vec![EvidenceRef::quote_only(quote)],
    }
}

/// Truncate on a char boundary to the configured context limit.
fn truncate_context(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

#[async_trait]
impl FieldExtraction for ModelStrategy {
    async fn extract(
        &self,
        schema: &DocumentTypeSchema,
        evidence: &DocumentEvidence,
    ) -> Result<CandidateSet, ServiceError> {
        let context = truncate_context(evidence.full_text(), self.max_context_chars);
        let prompt = self.build_prompt(schema, context);

        let payload = self.call_service(&prompt).await?;

        // A reply with no fields violates the requested schema.
        if payload.fields.is_empty() {
            return Err(ServiceError::MalformedResponse(
                "payload contains no fields".to_string(),
            ));
        }

        let fields: Vec<FieldCandidate> = schema
            .fields
            .iter()
            .map(|def| match payload.fields.get(def.name) {
                Some(raw) => self.coerce_field(def.name, def.kind, raw, evidence),
                None => FieldCandidate::missing(def.name, ExtractionMethod::Model),
            })
            .collect();

        for name in payload.fields.keys() {
            if schema.field(name).is_none() {
                debug!(field = %name, "service returned field not in schema, ignoring");
            }
        }

        let line_items = payload
            .line_items
            .iter()
            .map(|raw| self.coerce_line_item(raw, evidence))
            .collect();

        Ok(CandidateSet {
            fields,
            line_items,
            warnings: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::{BoundingBox, EvidenceUnit, PageEvidence};
    use crate::schema::{DocumentType, SchemaRegistry};
    use std::sync::Mutex;

    struct QueuedService {
        replies: Mutex<Vec<Result<ServicePayload, ServiceError>>>,
    }

    impl QueuedService {
        fn new(replies: Vec<Result<ServicePayload, ServiceError>>) -> Self {
            Self {
                replies: Mutex::new(replies),
            }
        }
    }

    #[async_trait]
    impl ExtractionService for QueuedService {
        async fn extract(&self, _prompt: &str) -> Result<ServicePayload, ServiceError> {
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(ServiceError::NotConfigured))
        }
    }

    fn sample_evidence() -> DocumentEvidence {
        let words = ["Claim", "Number:", "CLM-1", "Total:", "$125.00"];
        let tokens = words
            .iter()
            .enumerate()
            .map(|(i, w)| EvidenceUnit {
                text: w.to_string(),
                bbox: BoundingBox::new(i as f32 * 100.0, 0.0, 90.0, 12.0),
                page_index: 0,
                confidence: 0.9,
            })
            .collect();
        DocumentEvidence::new(
            vec![PageEvidence {
                page_index: 0,
                dimensions: (1000, 100),
                tokens,
            }],
            Vec::new(),
        )
    }

    fn payload(json: &str) -> ServicePayload {
        serde_json::from_str(json).unwrap()
    }

    fn strategy(service: QueuedService) -> ModelStrategy {
        ModelStrategy::new(Arc::new(service), &ServiceConfig::default())
    }

    #[tokio::test]
    async fn test_successful_extraction_maps_quotes_to_tokens() {
        let service = QueuedService::new(vec![Ok(payload(
            r#"{"fields": {"claim_number": {"value": "CLM-1", "confidence": 0.93, "quote": "Claim Number: CLM-1"}}}"#,
        ))]);
        let registry = SchemaRegistry::builtin();
        let schema = registry.schema_for(DocumentType::InsuranceClaim);
        let evidence = sample_evidence();

        let set = strategy(service).extract(schema, &evidence).await.unwrap();

        let claim = &set.fields[0];
        assert_eq!(claim.name, "claim_number");
        assert_eq!(claim.value, Some(FieldValue::Text("CLM-1".to_string())));
        assert_eq!(claim.method, ExtractionMethod::Model);
        // "Claim Number: CLM-1" -> probe "CLM-1" -> token 2.
        assert_eq!(claim.evidence[0].token_index, Some(2));

        // Fields the service did not return come back as null candidates.
        let policy = set
            .fields
            .iter()
            .find(|f| f.name == "policy_number")
            .unwrap();
        assert!(policy.is_absent());
        assert_eq!(policy.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_empty_fields_payload_is_schema_violation() {
        let service = QueuedService::new(vec![Ok(payload(r#"{"fields": {}}"#))]);
        let registry = SchemaRegistry::builtin();
        let schema = registry.schema_for(DocumentType::InsuranceClaim);
        let evidence = sample_evidence();

        let err = strategy(service)
            .extract(schema, &evidence)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_retry_once_then_succeed() {
        // Replies pop from the back: first a failure, then success.
        let service = QueuedService::new(vec![
            Ok(payload(
                r#"{"fields": {"claim_number": {"value": "CLM-1", "confidence": 0.9}}}"#,
            )),
            Err(ServiceError::MalformedResponse("garbled".to_string())),
        ]);
        let registry = SchemaRegistry::builtin();
        let schema = registry.schema_for(DocumentType::InsuranceClaim);
        let evidence = sample_evidence();

        let set = strategy(service).extract(schema, &evidence).await.unwrap();
        assert_eq!(
            set.fields[0].value,
            Some(FieldValue::Text("CLM-1".to_string()))
        );
    }

    #[tokio::test]
    async fn test_confidence_clamped_into_unit_range() {
        let service = QueuedService::new(vec![Ok(payload(
            r#"{"fields": {"claim_number": {"value": "CLM-1", "confidence": 3.5}}}"#,
        ))]);
        let registry = SchemaRegistry::builtin();
        let schema = registry.schema_for(DocumentType::InsuranceClaim);
        let evidence = sample_evidence();

        let set = strategy(service).extract(schema, &evidence).await.unwrap();
        assert_eq!(set.fields[0].confidence, 1.0);
    }

    #[test]
    fn test_coerce_amount_and_date_values() {
        use std::str::FromStr;

        let amount = coerce_value(FieldKind::Amount, &serde_json::json!("$1,820.55"));
        assert_eq!(
            amount,
            Some(FieldValue::Amount(Decimal::from_str("1820.55").unwrap()))
        );

        let date = coerce_value(FieldKind::Date, &serde_json::json!("02/10/2025"));
        assert_eq!(
            date,
            Some(FieldValue::Date(
                chrono::NaiveDate::from_ymd_opt(2025, 2, 10).unwrap()
            ))
        );

        // Unparseable stays text for validation to flag.
        let bad = coerce_value(FieldKind::Date, &serde_json::json!("soon"));
        assert_eq!(bad, Some(FieldValue::Text("soon".to_string())));

        assert_eq!(coerce_value(FieldKind::Name, &serde_json::Value::Null), None);
    }

    #[test]
    fn test_truncate_context_char_boundary() {
        assert_eq!(truncate_context("abcdef", 3), "abc");
        assert_eq!(truncate_context("ab", 10), "ab");
        // Multi-byte chars are not split.
        assert_eq!(truncate_context("ééé", 2), "éé");
    }
}

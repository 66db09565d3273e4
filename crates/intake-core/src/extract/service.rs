//! External extraction service boundary.
//!
//! The service is a capability with a non-zero failure rate: transport
//! errors, timeouts, and malformed payloads are all one uniform
//! [`ServiceError`] so the strategy layer can treat them as "unavailable"
//! and fall back deterministically.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::ServiceError;
use crate::models::config::ServiceConfig;

/// One field as returned by the service.
#[derive(Debug, Clone, Deserialize)]
pub struct RawField {
    #[serde(default)]
    pub value: serde_json::Value,

    #[serde(default)]
    pub confidence: f64,

    #[serde(default)]
    pub quote: Option<String>,
}

/// One line item as returned by the service.
#[derive(Debug, Clone, Deserialize)]
pub struct RawLineItem {
    #[serde(default)]
    pub service: Option<String>,

    #[serde(default)]
    pub code: Option<String>,

    #[serde(default)]
    pub amount: serde_json::Value,

    #[serde(default)]
    pub confidence: f64,

    #[serde(default)]
    pub quote: Option<String>,
}

/// Structured payload the service is asked to return.
#[derive(Debug, Clone, Deserialize)]
pub struct ServicePayload {
    #[serde(default)]
    pub document_type: Option<String>,

    #[serde(default)]
    pub fields: HashMap<String, RawField>,

    #[serde(default)]
    pub line_items: Vec<RawLineItem>,
}

/// Capability: schema-guided structured extraction over context text.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    async fn extract(&self, prompt: &str) -> Result<ServicePayload, ServiceError>;
}

/// Strip a markdown code fence around a JSON reply, if present.
fn strip_code_fences(s: &str) -> &str {
    let s = s.trim();
    let s = s
        .strip_prefix("```json")
        .or_else(|| s.strip_prefix("```"))
        .unwrap_or(s);
    s.strip_suffix("```").unwrap_or(s).trim()
}

/// Parse the model's reply text into a payload.
pub fn parse_payload(reply: &str) -> Result<ServicePayload, ServiceError> {
    let cleaned = strip_code_fences(reply);
    serde_json::from_str(cleaned).map_err(|e| ServiceError::MalformedResponse(e.to_string()))
}

// ---------------------------------------------------------------------------
// HTTP client (OpenAI-compatible chat completions)
// ---------------------------------------------------------------------------

#[derive(Debug, serde::Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, serde::Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Production extraction client speaking the OpenAI-compatible chat
/// completions wire format.
pub struct HttpExtractionClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl HttpExtractionClient {
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl ExtractionService for HttpExtractionClient {
    async fn extract(&self, prompt: &str) -> Result<ServicePayload, ServiceError> {
        if self.api_key.is_empty() {
            return Err(ServiceError::NotConfigured);
        }

        let request = ChatRequest {
            model: &self.model,
            temperature: 0.0,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "You extract structured medical and insurance fields.",
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::MalformedResponse(e.to_string()))?;

        let content = body
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .ok_or_else(|| ServiceError::MalformedResponse("empty completion".to_string()))?;

        debug!(chars = content.len(), "extraction service replied");
        parse_payload(content)
    }
}

//! Configuration structures for the intake pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Main configuration for the intake pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    /// OCR engine configuration.
    pub ocr: OcrConfig,

    /// Extraction service configuration.
    pub service: ServiceConfig,

    /// Confidence scoring configuration.
    pub scoring: ScoringConfig,

    /// Review routing configuration.
    pub routing: RoutingConfig,

    /// Per-document-type critical field overrides (empty = registry defaults).
    pub critical_fields: HashMap<String, Vec<String>>,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            ocr: OcrConfig::default(),
            service: ServiceConfig::default(),
            scoring: ScoringConfig::default(),
            routing: RoutingConfig::default(),
            critical_fields: HashMap::new(),
        }
    }
}

/// OCR engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Path to the tesseract binary.
    pub binary: PathBuf,

    /// Recognition language passed to the engine.
    pub language: String,

    /// Drop tokens below this engine confidence (0.0 - 1.0).
    pub min_token_confidence: f32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
            language: "eng".to_string(),
            min_token_confidence: 0.0,
        }
    }
}

/// External extraction service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service base URL (OpenAI-compatible chat completions).
    pub endpoint: String,

    /// Model identifier sent with each request.
    pub model: String,

    /// API key. Empty means the service is unavailable and the
    /// deterministic fallback strategy runs alone.
    pub api_key: String,

    /// Per-call deadline in milliseconds.
    pub timeout_ms: u64,

    /// Bounded retries before falling back (at most one is sensible).
    pub max_retries: u32,

    /// Evidence text is truncated to this many characters per request.
    pub max_context_chars: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: String::new(),
            timeout_ms: 30_000,
            max_retries: 1,
            max_context_chars: 12_000,
        }
    }
}

impl ServiceConfig {
    /// Whether the deployment has a usable extraction service.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.endpoint.is_empty()
    }
}

/// Confidence scoring configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Multiplier applied to a field's extraction confidence when
    /// validation failed (valid = 1.0, absent = 0.0).
    pub validity_penalty: f32,

    /// Confidence cap for fallback-extracted candidates.
    pub fallback_ceiling: f32,

    /// Weight of header fields in the document score; line items get the
    /// remainder. Redistributes entirely to fields when no line items.
    pub field_weight: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            validity_penalty: 0.5,
            fallback_ceiling: 0.6,
            field_weight: 0.8,
        }
    }
}

/// Review routing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Documents scoring below this go to the review queue.
    pub confidence_threshold: f32,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.8,
        }
    }
}

impl IntakeConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_policy() {
        let config = IntakeConfig::default();
        assert_eq!(config.routing.confidence_threshold, 0.8);
        assert_eq!(config.scoring.validity_penalty, 0.5);
        assert_eq!(config.scoring.fallback_ceiling, 0.6);
        assert_eq!(config.scoring.field_weight, 0.8);
        assert_eq!(config.service.max_retries, 1);
    }

    #[test]
    fn test_service_configured_requires_key() {
        let mut config = ServiceConfig::default();
        assert!(!config.is_configured());
        config.api_key = "sk-test".to_string();
        assert!(config.is_configured());
    }

    #[test]
    fn test_config_roundtrip() {
        let config = IntakeConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: IntakeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(
            parsed.routing.confidence_threshold,
            config.routing.confidence_threshold
        );
    }
}

//! Configuration models.

pub mod config;

pub use config::{IntakeConfig, OcrConfig, RoutingConfig, ScoringConfig, ServiceConfig};

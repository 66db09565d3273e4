//! Error types for the intake-core library.
//!
//! Only [`InputError`] and [`TypeResolutionError`] terminate a pipeline run.
//! OCR and extraction-service failures degrade into the result (empty page
//! evidence, fallback strategy) and surface as warnings instead.

use thiserror::Error;

/// Main error type for the intake library.
#[derive(Error, Debug)]
pub enum IntakeError {
    /// The input document cannot be processed at all.
    #[error("input error: {0}")]
    Input(#[from] InputError),

    /// The document type could not be determined.
    #[error("type resolution error: {0}")]
    TypeResolution(#[from] TypeResolutionError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Fatal input errors. No `ExtractionResult` is produced.
#[derive(Error, Debug)]
pub enum InputError {
    /// The document has no pages.
    #[error("document has no pages")]
    NoPages,

    /// The input could not be read at all.
    #[error("unreadable input: {0}")]
    Unreadable(String),
}

/// The document type could not be resolved. Fatal for the run, surfaced
/// distinctly so the caller can retry with an explicit hint.
#[derive(Error, Debug)]
pub enum TypeResolutionError {
    /// The caller-supplied hint names no known document type.
    #[error("unknown document type hint: {0}")]
    UnknownHint(String),

    /// The evidence text contains no classification signals.
    #[error("no document type signals found")]
    NoSignals,

    /// Signals for multiple document types tied.
    #[error("ambiguous document type: {insurance} insurance vs {medical} medical signals")]
    Ambiguous { insurance: usize, medical: usize },
}

/// Errors from the OCR engine. Recoverable per page: the page contributes
/// empty evidence and a warning on the result.
#[derive(Error, Debug)]
pub enum OcrError {
    /// The OCR binary could not be invoked.
    #[error("OCR engine unavailable: {0}")]
    EngineUnavailable(String),

    /// The page image could not be decoded.
    #[error("invalid page image: {0}")]
    InvalidImage(String),

    /// The engine ran but its output could not be used.
    #[error("text recognition failed: {0}")]
    Recognition(String),
}

/// Errors from the external extraction service. Recoverable: any variant
/// triggers the fallback strategy, never a hard failure to the caller.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Transport-level failure.
    #[error("extraction service request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The call exceeded its deadline.
    #[error("extraction service timed out")]
    Timeout,

    /// The response body was not the expected JSON payload.
    #[error("malformed service response: {0}")]
    MalformedResponse(String),

    /// The service is not configured for this deployment.
    #[error("extraction service not configured")]
    NotConfigured,
}

/// Result type for the intake library.
pub type Result<T> = std::result::Result<T, IntakeError>;

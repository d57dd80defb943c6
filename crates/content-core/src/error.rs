//! Shared error type for the content pipeline core.

use thiserror::Error;

/// Result alias used across every content-pipeline crate.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors a caller can observe from the core. Mirrors the error kinds named in
/// the design: store failures are always fatal to the step that hit them,
/// provider/adapter failures are always business-level and never propagate as
/// panics or cancellations.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("store failure: {0}")]
    Store(String),

    #[error("source adapter '{source}' failed: {message}")]
    SourceAdapter { source: String, message: String },

    #[error("llm provider returned malformed output: {0}")]
    MalformedResponse(String),

    #[error("provider timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("provider call failed: {0}")]
    Provider(String),

    #[error("invariant violation: {0}")]
    Invariant(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

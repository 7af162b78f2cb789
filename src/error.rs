//! Error types for the query router

use thiserror::Error;

/// Result type alias for router operations
pub type Result<T> = std::result::Result<T, RouterError>;

#[derive(Error, Debug)]
pub enum RouterError {

    // =============================
    // Core Pipeline Errors
    // =============================

    #[error("LLM error: {0}")]
    LlmError(String),

    /// Raised inside quote providers only; they convert it into the
    /// unavailable quote before returning.
    #[error("Quote lookup error: {0}")]
    QuoteError(String),

    #[error("Unrecognized intent: {0:?}")]
    UnrecognizedIntent(String),

    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("State conflict: {0}")]
    StateConflict(String),

    #[error("Step budget of {0} exceeded")]
    StepBudgetExceeded(usize),

    #[error("Graph finished without a response")]
    MissingResponse,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

//! Error types for the engine

use thiserror::Error;

/// Result type alias using our EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

/// Main error type for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// A snapshot or fair-value estimate violates its domain constraints
    #[error("invalid market data: {0}")]
    InvalidMarketData(String),

    /// An external fetch failed (network, parse)
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// Sizing cannot determine current exposure
    #[error("insufficient exposure data: {0}")]
    InsufficientExposureData(String),

    /// The decision log write failed after retries
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    /// HTTP request errors
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Database errors
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Market not found
    #[error("market not found: {0}")]
    MarketNotFound(String),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Whether this error aborts the whole cycle rather than one market.
    ///
    /// Market-local conditions (bad data, one unreachable source) are logged
    /// and the cycle continues; persistence and configuration problems are
    /// escalated.
    pub fn is_cycle_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::Persistence(_) | EngineError::Configuration(_) | EngineError::Database(_)
        )
    }
}

//! Error types for the engine

use thiserror::Error;

/// Result type alias using our EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

/// Main error type for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// Quote currency code is not one we can normalize
    #[error("Unsupported quote currency: {0}")]
    UnsupportedCurrency(String),

    /// FX rate is older than the configured TTL
    #[error("Stale FX rate: age {age_seconds}s exceeds TTL {ttl_seconds}s")]
    StaleFxRate { age_seconds: i64, ttl_seconds: i64 },

    /// FX provider could not supply a rate
    #[error("FX rate unavailable: {0}")]
    FxUnavailable(String),

    /// Market data fetch failure (recoverable, counted per tick)
    #[error("Market data error: {0}")]
    MarketData(String),

    /// Token bucket for a venue is exhausted
    #[error("Rate limited on venue: {venue}")]
    RateLimited { venue: String },

    /// Entry and exit leg quantities diverge beyond tolerance
    #[error("Quantity mismatch: entry {entry_qty} vs exit {exit_qty} exceeds {tolerance_pct}% tolerance")]
    QuantityMismatch {
        entry_qty: String,
        exit_qty: String,
        tolerance_pct: String,
    },

    /// An invariant required by the execution contract was broken
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Illegal admin control transition
    #[error("Invalid control transition: {command} not allowed from {from}")]
    InvalidTransition { command: String, from: String },

    /// Persistence/ledger failures (logged, never fatal to the loop)
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Filesystem errors while writing evidence
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// True for data-quality failures that reject the current candidate but
    /// let the tick continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::StaleFxRate { .. }
                | EngineError::FxUnavailable(_)
                | EngineError::MarketData(_)
                | EngineError::RateLimited { .. }
        )
    }
}

/// Herald error types and handling utilities
use thiserror::Error;

/// Main error type for herald operations
#[derive(Debug, Error)]
pub enum HeraldError {
    /// Git metadata could not be collected
    #[error("Git error in {operation}: {reason}")]
    Git { operation: String, reason: String },

    /// Status report could not be delivered
    #[error("Delivery to {endpoint} failed: {reason}")]
    Delivery { endpoint: String, reason: String },

    /// The CI host has no field allow-list; serializing it would leak every field
    #[error("CI host '{host}' is not supported by the field filter")]
    UnsupportedHost { host: String },

    /// Invalid notifier configuration
    #[error("Configuration error: {reason}")]
    Config { reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HeraldError>;

use thiserror::Error;

/// Errors raised when extraction settings are inconsistent.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Job id must not be empty")]
    EmptyJobId,

    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("Checkpoint stride must be at least 1")]
    ZeroStride,

    #[error("Base delay ({base_ms}ms) exceeds the backoff ceiling ({max_ms}ms)")]
    DelayAboveCeiling { base_ms: u128, max_ms: u128 },

    #[error("Credential '{0}' has an empty value")]
    EmptyCredential(String),

    #[error("Query parameter '{0}' is reserved")]
    ReservedParam(String),
}

//! Provider error types.
//!
//! All provider operations return [`Result<T>`] which uses
//! [`ProviderError`] as the error type.

use thiserror::Error;

/// Errors that can occur when interacting with an LLM provider.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProviderError {
    /// The transport-level request to the provider failed.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// Authentication with the provider was rejected.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The provider returned a rate-limit response.
    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited {
        /// Suggested wait time before retrying, in milliseconds.
        retry_after_ms: u64,
    },

    /// The requested model does not exist on the provider.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The provider has not been configured (e.g. missing API key).
    #[error("provider not configured: {0}")]
    NotConfigured(String),

    /// The provider returned a response that could not be parsed.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The structured payload did not satisfy the requested schema,
    /// even after repair and a corrective retry.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// The request timed out.
    #[error("timeout")]
    Timeout,

    /// A JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProviderError {
    /// Whether a retry has any chance of succeeding.
    ///
    /// Rate limiting, timeouts, and 5xx-class or connection-level
    /// transport failures are transient; auth, schema, and parse
    /// failures are not.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::RateLimited { .. } | ProviderError::Timeout => true,
            ProviderError::RequestFailed(msg) => {
                msg.contains("HTTP 5") || msg.to_ascii_lowercase().contains("connection")
            }
            _ => false,
        }
    }

    /// The wait the provider itself asked for, if it named one.
    pub fn suggested_delay(&self) -> Option<std::time::Duration> {
        match self {
            ProviderError::RateLimited { retry_after_ms } => {
                Some(std::time::Duration::from_millis(*retry_after_ms))
            }
            _ => None,
        }
    }
}

/// A convenience type alias for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

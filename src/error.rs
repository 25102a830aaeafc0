//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Tier Identifier ==
/// Names one side of a hierarchical cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    L1,
    L2,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::L1 => write!(f, "L1"),
            Tier::L2 => write!(f, "L2"),
        }
    }
}

// == Cache Error Enum ==
/// Unified error type for the cache engine.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key absent or expired
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Configuration rejected at construction
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Operation has no defined meaning in the current mode
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// One tier of a hierarchical cache failed after the other succeeded
    #[error("{tier} tier failed: {source}")]
    PartialTierFailure {
        tier: Tier,
        #[source]
        source: Box<CacheError>,
    },

    /// Empty shard set or out-of-range shard index
    #[error("Shard unavailable: {0}")]
    ShardUnavailable(String),

    /// Stored value is not a base-10 integer
    #[error("Value is not a number: {0}")]
    NotANumber(String),

    /// Counter arithmetic left the i64 range
    #[error("Integer overflow: {0}")]
    Overflow(String),

    /// Invalid request data (key or value limits)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Serializer failed to encode or decode a value
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Compressor failed to encode or decode a payload
    #[error("Compression error: {0}")]
    Compression(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Returns true for a plain miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound(_))
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_)
            | CacheError::NotANumber(_)
            | CacheError::Overflow(_) => StatusCode::BAD_REQUEST,
            CacheError::UnsupportedOperation(_) => StatusCode::NOT_IMPLEMENTED,
            CacheError::ShardUnavailable(_) | CacheError::PartialTierFailure { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            CacheError::InvalidConfiguration(_)
            | CacheError::Serialization(_)
            | CacheError::Compression(_)
            | CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;

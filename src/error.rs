//! Error types for the cache layer
//!
//! Cache-internal conditions (expiry, corruption) are never errors; they
//! surface as misses. Only caller mistakes end up here.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache layer.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Value could not be serialized for storage
    #[error("Serialization failed for {category}/{key}: {source}")]
    Serialization {
        category: String,
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Configuration could not be parsed
    #[error("Invalid configuration: {0}")]
    Config(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache layer.
pub type Result<T> = std::result::Result<T, CacheError>;

//! Error types for cache repositories
//!
//! Codecs, pipeline stages and backend clients report failures with
//! `anyhow::Error`; repositories lift them into [`CacheError`] so callers can
//! tell a rejected key from an unreachable backend or an undecodable payload.

use thiserror::Error;

/// Unified error type for cache repository operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key is empty or consists only of whitespace
    #[error("invalid cache key: {0:?}")]
    InvalidKey(String),

    /// The backend client call failed (connectivity, protocol, server error)
    #[error("{backend} backend error: {source}")]
    Backend {
        backend: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// The value could not be turned into its stored form
    #[error("failed to serialize value for key '{key}': {source}")]
    Serialization {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// The stored bytes could not be turned back into the requested type
    #[error("failed to deserialize value for key '{key}': {source}")]
    Deserialization {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// The envelope was written for a different type than the one requested
    #[error("type mismatch for key '{key}': stored {stored}, requested {requested}")]
    TypeMismatch {
        key: String,
        stored: String,
        requested: &'static str,
    },

    /// An envelope was found but this repository has no serializer to open it
    #[error("key '{key}' holds a serialized envelope but no serializer is configured")]
    SerializerMissing { key: String },

    /// The raw payload does not follow the backend's framing
    #[error("corrupted cache payload for key '{key}': {reason}")]
    Corrupted { key: String, reason: String },

    /// Invalid region or settings
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CacheError {
    pub(crate) fn backend(backend: &'static str, source: anyhow::Error) -> Self {
        Self::Backend { backend, source }
    }

    /// Whether this error was raised before any backend I/O took place.
    #[must_use]
    pub fn is_invalid_key(&self) -> bool {
        matches!(self, Self::InvalidKey(_))
    }
}

/// Convenience Result type for cache repository operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Reject empty and whitespace-only keys.
///
/// # Errors
///
/// Returns [`CacheError::InvalidKey`] when `key` has no visible characters.
pub fn validate_key(key: &str) -> CacheResult<()> {
    if key.trim().is_empty() {
        return Err(CacheError::InvalidKey(key.to_string()));
    }
    Ok(())
}

//! Cache Repository Traits
//!
//! This module defines the trait abstractions that make every piece of the
//! repository pluggable.
//!
//! # Architecture
//!
//! - `CacheCodec`: Trait for pluggable serialization backends
//! - `TransformStage`: Byte-to-byte stage of a serializer pipeline (compression, encryption)
//! - `CacheRepository`: The backend-agnostic get/set/remove/clear contract
//! - `MemcachedClient`: Raw access to a native-capable, memcached-style store
//! - `BlobStore`: Raw access to a blob-only store with regions and absolute expiry
//!
//! # Example: Custom Blob Store
//!
//! ```rust,ignore
//! use cache_repository::{BlobStore, async_trait};
//! use std::time::SystemTime;
//! use anyhow::Result;
//!
//! struct MyBlobStore {
//!     // Your implementation
//! }
//!
//! #[async_trait]
//! impl BlobStore for MyBlobStore {
//!     async fn get(&self, region: &str, key: &str) -> Result<Option<Vec<u8>>> {
//!         // Your implementation
//!     }
//!
//!     async fn insert(&self, region: &str, key: &str, value: &[u8], expires_at: SystemTime) -> Result<()> {
//!         // Your implementation
//!     }
//!
//!     async fn remove(&self, region: &str, key: &str) -> Result<()> {
//!         // Your implementation
//!     }
//!
//!     async fn clear_region(&self, region: &str) -> Result<usize> {
//!         // Your implementation
//!     }
//! }
//! ```

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::time::{Duration, SystemTime};

use crate::backends::RepositoryStats;
use crate::config::RegionConfig;
use crate::error::CacheResult;

/// Trait for cache value serialization/deserialization
///
/// This trait provides a pluggable serialization abstraction for the cache system,
/// allowing users to choose between different serialization backends (e.g., `serde_json`,
/// `bincode`, BSON) or implement custom serializers.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync + Debug` to support concurrent access across async tasks
/// and provide debugging capabilities.
///
/// # Example: Custom Codec
///
/// ```rust,ignore
/// use cache_repository::CacheCodec;
/// use anyhow::Result;
/// use serde::{Serialize, de::DeserializeOwned};
///
/// #[derive(Debug)]
/// struct MyCustomCodec;
///
/// impl CacheCodec for MyCustomCodec {
///     fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
///         Ok(mycodec::serialize(value)?)
///     }
///
///     fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
///         Ok(mycodec::deserialize(bytes)?)
///     }
///
///     fn name(&self) -> &'static str {
///         "mycodec"
///     }
/// }
/// ```
pub trait CacheCodec: Send + Sync + Debug {
    /// Serialize a value to bytes
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be represented by this codec.
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>>;

    /// Deserialize bytes to a value
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid encoding of `T`.
    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T>;

    /// Get the name of the codec
    ///
    /// This is used for logging and debugging purposes.
    fn name(&self) -> &'static str;
}

/// One byte-to-byte stage of a serializer pipeline
///
/// Stages run after the codec when writing (`encode`) and before it when
/// reading (`decode`), in reverse order. `decode(encode(b))` must return `b`.
pub trait TransformStage: Send + Sync + Debug {
    /// Transform bytes on the way into the cache
    ///
    /// # Errors
    ///
    /// Returns an error if the stage cannot process the input.
    fn encode(&self, bytes: Vec<u8>) -> Result<Vec<u8>>;

    /// Undo `encode` on the way out of the cache
    ///
    /// # Errors
    ///
    /// Returns an error if the input was not produced by `encode` (or was tampered with).
    fn decode(&self, bytes: Vec<u8>) -> Result<Vec<u8>>;

    /// Stage name used in logs and pipeline descriptions
    fn name(&self) -> &'static str;
}

/// Backend-agnostic caching contract
///
/// Every operation validates its key first: empty or whitespace-only keys
/// fail with [`CacheError::InvalidKey`](crate::CacheError::InvalidKey) before
/// any backend I/O. Each operation maps to exactly one backend call; backend
/// failures propagate without retry.
///
/// # Thread Safety
///
/// Implementations are shared across tasks; concurrent writers to the same key
/// are ordered by the backend alone (last physical write wins).
#[async_trait]
pub trait CacheRepository: Send + Sync {
    /// Get a previously stored value
    ///
    /// # Returns
    ///
    /// * `Ok(Some(value))` - Value found and decoded as `T`
    /// * `Ok(None)` - Key unknown or expired
    /// * `Err(e)` - Invalid key, backend failure or undecodable payload
    async fn get<T>(&self, key: &str) -> CacheResult<Option<T>>
    where
        T: DeserializeOwned + Send + 'static;

    /// Store a value, unconditionally replacing any previous entry
    ///
    /// # Arguments
    ///
    /// * `key` - The cache key
    /// * `value` - The value to store
    /// * `valid_for` - Lifetime of the entry; `Duration::ZERO` selects the
    ///   region's configured expiration
    async fn set<T>(&self, key: &str, value: &T, valid_for: Duration) -> CacheResult<()>
    where
        T: Serialize + Sync + ?Sized;

    /// Remove a value; removing an absent key is not an error
    async fn remove(&self, key: &str) -> CacheResult<()>;

    /// Remove every entry the repository can see
    ///
    /// Region-scoped where the backend supports regions, a global flush otherwise.
    async fn clear(&self) -> CacheResult<()>;

    /// Check if the backend is reachable and round-trips a probe value
    async fn health_check(&self) -> bool;

    /// Region configuration this repository was built with
    fn region(&self) -> &RegionConfig;

    /// Whether `valid_for` passed to `set` is honored per entry
    fn supports_per_item_expiration(&self) -> bool;

    /// Hit/miss/set/remove counters since construction
    fn stats(&self) -> RepositoryStats;

    /// Get the name of the backend behind this repository
    fn name(&self) -> &'static str {
        "unknown"
    }
}

/// Raw memcached-style client
///
/// Values are byte strings tagged with 32-bit flags. Expirations follow the
/// memcached protocol: `0` never expires (server default), values up to
/// 30 days are relative seconds, larger values are absolute unix timestamps.
#[async_trait]
pub trait MemcachedClient: Send + Sync {
    /// Fetch the raw bytes and flags for `key`
    async fn get(&self, key: &str) -> Result<Option<(Vec<u8>, u32)>>;

    /// Unconditional store
    async fn set(&self, key: &str, value: &[u8], flags: u32, expiration: u32) -> Result<()>;

    /// Delete `key`, returning whether it existed
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Invalidate every item on every server
    async fn flush(&self) -> Result<()>;

    /// Client name for logging
    fn name(&self) -> &'static str {
        "memcached"
    }
}

/// Raw blob-only store with named regions and absolute expiration
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch the blob stored under `key` in `region`
    async fn get(&self, region: &str, key: &str) -> Result<Option<Vec<u8>>>;

    /// Insert or replace a blob that expires at the given instant
    async fn insert(
        &self,
        region: &str,
        key: &str,
        value: &[u8],
        expires_at: SystemTime,
    ) -> Result<()>;

    /// Remove a blob; absent keys are ignored
    async fn remove(&self, region: &str, key: &str) -> Result<()>;

    /// Remove every blob of `region`, returning how many were removed
    async fn clear_region(&self, region: &str) -> Result<usize>;

    /// Store name for logging
    fn name(&self) -> &'static str {
        "blob-store"
    }
}

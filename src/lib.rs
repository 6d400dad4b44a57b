//! Cache Repository
//!
//! A pluggable caching layer with one get/set/remove/clear contract over
//! stores of very different capability:
//! - **Memcached**: native-capable store that keeps text and integers in its
//!   own representation, so other clients can read (and `incr`) them
//! - **Shared Cache**: blob-only distributed store (Redis) with named regions
//!   and absolute expiration timestamps
//! - **Envelope Storage**: with a serializer configured, values are stored as
//!   a type-tagged [`CacheItem`] and checked against the requested type on read
//! - **Serializer Pipelines**: JSON, MessagePack, Bincode or BSON, optionally
//!   followed by deflate compression and AES-256-GCM encryption
//! - **Region Configuration**: per-region default expiration and compression
//!   threshold, loadable from JSON or the environment
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use cache_repository::backends::{MemcachedRepository, connect_from_env};
//! use cache_repository::{CacheRepository, RegionConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Connect to MEMCACHED_URL (default memcache://127.0.0.1:11211)
//!     let client = Arc::new(connect_from_env()?);
//!     let cache = MemcachedRepository::new(client, RegionConfig::default());
//!
//!     // Integers and text are stored natively
//!     cache.set("visits", &1u64, Duration::from_secs(60)).await?;
//!     let visits: Option<u64> = cache.get("visits").await?;
//!     tracing::info!("Visits: {:?}", visits);
//!
//!     cache.remove("visits").await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! caller ─► CacheRepository ─► StoredValue (Native | Wrapped(CacheItem))
//!                │                   │
//!                │            Serializer: codec → stages (deflate, AES-GCM)
//!                ▼
//!        MemcachedRepository ─► MemcachedClient (memcache::Client, DashMapMemcached)
//!        SharedCacheRepository ─► BlobStore (RedisBlobStore, DashMapBlobStore)
//! ```

pub mod backends;
pub mod builder;
pub mod codecs;
pub mod config;
pub mod envelope;
pub mod error;
pub mod lazy;
pub mod serializer;
pub mod traits;

pub use backends::{
    DashMapBlobStore, DashMapMemcached, MemcachedRepository, RepositoryStats,
    SharedCacheRepository,
};

// Optional backends (feature-gated)
#[cfg(feature = "redis")]
pub use backends::RedisBlobStore;

pub use builder::CacheRepositoryBuilder;
pub use codecs::{JsonCodec, MsgPackCodec};
#[cfg(feature = "bincode")]
pub use codecs::BincodeCodec;
#[cfg(feature = "bson")]
pub use codecs::BsonCodec;
pub use config::{
    CacheSettings, DEFAULT_COMPRESS_THRESHOLD, DEFAULT_EXPIRATION, DEFAULT_REGION, RegionConfig,
    USE_REGION_DEFAULT,
};
pub use envelope::{CacheItem, StoredValue, type_tag};
pub use error::{CacheError, CacheResult, validate_key};
pub use lazy::LazyClient;
pub use serializer::Serializer;
#[cfg(feature = "encryption")]
pub use serializer::AesGcmStage;
#[cfg(feature = "compression")]
pub use serializer::DeflateStage;
pub use traits::{BlobStore, CacheCodec, CacheRepository, MemcachedClient, TransformStage};

// Re-export async_trait for user convenience
pub use async_trait::async_trait;

//! Cache Backend Implementations
//!
//! This module contains the repository adapters and the clients they run on.
//!
//! # Repositories
//!
//! - **`MemcachedRepository`** - native-capable store: text and integers are kept
//!   natively, everything else as JSON or, with a serializer, in an envelope
//! - **`SharedCacheRepository`** - blob-only store with named regions and
//!   absolute expiration timestamps
//!
//! # Clients
//!
//! - **`memcache::Client`** - real memcached servers (feature: `memcached`)
//! - **`RedisBlobStore`** - Redis as the shared blob store (feature: `redis`)
//! - **`DashMapMemcached`** / **`DashMapBlobStore`** - in-process stores for
//!   tests and single-node deployments
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use cache_repository::backends::{DashMapBlobStore, SharedCacheRepository};
//! use cache_repository::{CacheRepository, RegionConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = Arc::new(DashMapBlobStore::new());
//! let cache = SharedCacheRepository::new(store, RegionConfig::new("orders"));
//!
//! cache.set("order:1", &42u32, Duration::from_secs(60)).await?;
//! assert_eq!(cache.get::<u32>("order:1").await?, Some(42));
//! # Ok(())
//! # }
//! ```

pub mod dashmap_cache;
pub mod memcached_cache;
pub mod shared_cache;

#[cfg(feature = "redis")]
pub mod redis_cache;

pub use dashmap_cache::{DashMapBlobStore, DashMapMemcached};
pub use memcached_cache::MemcachedRepository;
pub use shared_cache::SharedCacheRepository;

#[cfg(feature = "memcached")]
pub use memcached_cache::{connect, connect_from_env};

#[cfg(feature = "redis")]
pub use redis_cache::RedisBlobStore;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of a repository's operation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepositoryStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub removes: u64,
}

impl RepositoryStats {
    /// Hit rate in percent over all completed gets
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Counters shared by the repository adapters
#[derive(Debug, Clone, Default)]
pub(crate) struct OperationCounters {
    /// Hit counter
    hits: Arc<AtomicU64>,
    /// Miss counter
    misses: Arc<AtomicU64>,
    /// Set counter
    sets: Arc<AtomicU64>,
    /// Remove counter
    removes: Arc<AtomicU64>,
}

impl OperationCounters {
    pub(crate) fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn remove(&self) {
        self.removes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> RepositoryStats {
        RepositoryStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
        }
    }
}

//! `DashMap` Stores - In-Process Backends
//!
//! Lightweight in-memory implementations of [`MemcachedClient`] and
//! [`BlobStore`] built on `DashMap`. They follow the same expiration rules as
//! the servers they stand in for, which makes them suitable for tests and
//! single-node deployments.

use anyhow::Result;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

use super::memcached_cache::MAX_RELATIVE_EXPIRATION;

/// Stored bytes with expiration tracking
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Vec<u8>,
    flags: u32,
    expires_at: Option<SystemTime>,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| SystemTime::now() >= expires_at)
    }
}

/// Translate a memcached expiration field into an absolute instant
fn memcached_deadline(expiration: u32, now: SystemTime) -> Option<SystemTime> {
    match u64::from(expiration) {
        0 => None,
        secs if secs <= MAX_RELATIVE_EXPIRATION => Some(now + Duration::from_secs(secs)),
        secs => Some(UNIX_EPOCH + Duration::from_secs(secs)),
    }
}

/// Memcached stand-in backed by `DashMap`
///
/// **Features**:
/// - Byte values with flags, exactly as memcached stores them
/// - Relative (≤ 30 days) and absolute expirations
/// - Lazy removal of expired entries on read
///
/// **Limitations**:
/// - No eviction policy and no size limit
/// - Single process only
///
/// **Example**:
/// ```rust
/// use std::sync::Arc;
/// use cache_repository::backends::{DashMapMemcached, MemcachedRepository};
/// use cache_repository::{CacheRepository, RegionConfig, USE_REGION_DEFAULT};
///
/// # async fn example() -> anyhow::Result<()> {
/// let cache = MemcachedRepository::new(Arc::new(DashMapMemcached::new()), RegionConfig::default());
/// cache.set("answer", &42, USE_REGION_DEFAULT).await?;
/// assert_eq!(cache.get::<i32>("answer").await?, Some(42));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct DashMapMemcached {
    map: Arc<DashMap<String, CacheEntry>>,
}

impl DashMapMemcached {
    pub fn new() -> Self {
        info!("Initializing DashMap Memcached store");
        Self::default()
    }

    /// Remove expired entries, returning how many were dropped
    pub fn cleanup_expired(&self) -> usize {
        let mut removed = 0;
        self.map.retain(|_, entry| {
            if entry.is_expired() {
                removed += 1;
                false
            } else {
                true
            }
        });
        if removed > 0 {
            debug!(count = removed, "[DashMap] Cleaned up expired entries");
        }
        removed
    }

    /// Expiration instant of a live entry (`None` when absent or never expiring)
    pub fn expires_at(&self, key: &str) -> Option<SystemTime> {
        self.map.get(key).and_then(|entry| entry.expires_at)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Blob store stand-in backed by `DashMap`, keyed by `(region, key)`
///
/// **Example**:
/// ```rust
/// use std::time::{Duration, SystemTime};
/// use cache_repository::BlobStore;
/// use cache_repository::backends::DashMapBlobStore;
///
/// # async fn example() -> anyhow::Result<()> {
/// let store = DashMapBlobStore::new();
/// store.insert("region", "k", b"v", SystemTime::now() + Duration::from_secs(5)).await?;
/// assert_eq!(store.get("region", "k").await?, Some(b"v".to_vec()));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct DashMapBlobStore {
    map: Arc<DashMap<(String, String), CacheEntry>>,
}

impl DashMapBlobStore {
    pub fn new() -> Self {
        info!("Initializing DashMap Blob store");
        Self::default()
    }

    /// Remove expired entries, returning how many were dropped
    pub fn cleanup_expired(&self) -> usize {
        let mut removed = 0;
        self.map.retain(|_, entry| {
            if entry.is_expired() {
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }

    /// Number of entries currently held for `region`, expired ones included
    pub fn region_len(&self, region: &str) -> usize {
        self.map.iter().filter(|e| e.key().0 == region).count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

// ===== Trait Implementations =====

use crate::traits::{BlobStore, MemcachedClient};
use async_trait::async_trait;

#[async_trait]
impl MemcachedClient for DashMapMemcached {
    async fn get(&self, key: &str) -> Result<Option<(Vec<u8>, u32)>> {
        if let Some(entry) = self.map.get(key) {
            if entry.is_expired() {
                drop(entry); // Release read lock
                // A concurrent write may have replaced the entry since
                self.map.remove_if(key, |_, entry| entry.is_expired());
                Ok(None)
            } else {
                Ok(Some((entry.value.clone(), entry.flags)))
            }
        } else {
            Ok(None)
        }
    }

    async fn set(&self, key: &str, value: &[u8], flags: u32, expiration: u32) -> Result<()> {
        let entry = CacheEntry {
            value: value.to_vec(),
            flags,
            expires_at: memcached_deadline(expiration, SystemTime::now()),
        };
        self.map.insert(key.to_string(), entry);
        debug!(key = %key, expiration = expiration, "[DashMap] Stored memcached item");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.map.remove(key).is_some())
    }

    async fn flush(&self) -> Result<()> {
        self.map.clear();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "DashMap"
    }
}

#[async_trait]
impl BlobStore for DashMapBlobStore {
    async fn get(&self, region: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let id = (region.to_string(), key.to_string());
        if let Some(entry) = self.map.get(&id) {
            if entry.is_expired() {
                drop(entry); // Release read lock
                self.map.remove_if(&id, |_, entry| entry.is_expired());
                Ok(None)
            } else {
                Ok(Some(entry.value.clone()))
            }
        } else {
            Ok(None)
        }
    }

    async fn insert(
        &self,
        region: &str,
        key: &str,
        value: &[u8],
        expires_at: SystemTime,
    ) -> Result<()> {
        let entry = CacheEntry {
            value: value.to_vec(),
            flags: 0,
            expires_at: Some(expires_at),
        };
        self.map.insert((region.to_string(), key.to_string()), entry);
        Ok(())
    }

    async fn remove(&self, region: &str, key: &str) -> Result<()> {
        self.map.remove(&(region.to_string(), key.to_string()));
        Ok(())
    }

    async fn clear_region(&self, region: &str) -> Result<usize> {
        let mut removed = 0;
        self.map.retain(|(entry_region, _), _| {
            if entry_region == region {
                removed += 1;
                false
            } else {
                true
            }
        });
        debug!(region = %region, count = removed, "[DashMap] Cleared region");
        Ok(removed)
    }

    fn name(&self) -> &'static str {
        "DashMap"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memcached_deadline() {
        let now = UNIX_EPOCH + Duration::from_secs(1_000);
        assert_eq!(memcached_deadline(0, now), None);
        assert_eq!(memcached_deadline(30, now), Some(now + Duration::from_secs(30)));
        assert_eq!(
            memcached_deadline(1_800_000_000, now),
            Some(UNIX_EPOCH + Duration::from_secs(1_800_000_000))
        );
    }

    #[tokio::test]
    async fn test_memcached_store_flags_and_expiry() {
        let store = DashMapMemcached::new();
        store.set("a", b"1", 1, 0).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some((b"1".to_vec(), 1)));
        assert_eq!(store.expires_at("a"), None);

        // An absolute timestamp in the past is already expired.
        store.set("b", b"x", 0, MAX_RELATIVE_EXPIRATION as u32 + 1).await.unwrap();
        assert_eq!(store.get("b").await.unwrap(), None);

        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_cleanup_keeps_fresh_write() {
        let store = DashMapMemcached::new();
        let past = SystemTime::now() - Duration::from_secs(1);
        store.map.insert(
            "k".to_string(),
            CacheEntry {
                value: b"old".to_vec(),
                flags: 0,
                expires_at: Some(past),
            },
        );

        // A reader that saw the expired entry must not drop its replacement
        let entry = store.map.get("k").unwrap();
        assert!(entry.is_expired());
        drop(entry);
        store.set("k", b"new", 0, 0).await.unwrap();
        assert!(store.map.remove_if("k", |_, e| e.is_expired()).is_none());
        assert_eq!(store.get("k").await.unwrap(), Some((b"new".to_vec(), 0)));

        let blobs = DashMapBlobStore::new();
        blobs.insert("r", "k", b"old", past).await.unwrap();
        assert_eq!(blobs.get("r", "k").await.unwrap(), None);
        assert!(blobs.is_empty());
        let later = SystemTime::now() + Duration::from_secs(60);
        blobs.insert("r", "k", b"new", later).await.unwrap();
        assert_eq!(blobs.get("r", "k").await.unwrap(), Some(b"new".to_vec()));
    }

    #[tokio::test]
    async fn test_blob_store_regions() {
        let store = DashMapBlobStore::new();
        let later = SystemTime::now() + Duration::from_secs(60);
        store.insert("r1", "k", b"1", later).await.unwrap();
        store.insert("r1", "j", b"2", later).await.unwrap();
        store.insert("r2", "k", b"3", later).await.unwrap();

        assert_eq!(store.clear_region("r1").await.unwrap(), 2);
        assert_eq!(store.get("r1", "k").await.unwrap(), None);
        assert_eq!(store.get("r2", "k").await.unwrap(), Some(b"3".to_vec()));
        assert_eq!(store.region_len("r2"), 1);

        store
            .insert("r2", "old", b"4", SystemTime::now() - Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(store.cleanup_expired(), 1);
        assert_eq!(store.len(), 1);
    }
}

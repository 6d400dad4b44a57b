//! Shared Cache Repository - Blob-Only Backend
//!
//! Repository over a distributed store that only accepts byte blobs, keeps
//! entries in named regions and expires them at absolute timestamps.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::{OperationCounters, RepositoryStats};
use crate::codecs::{JsonCodec, MsgPackCodec};
use crate::config::RegionConfig;
use crate::envelope::StoredValue;
use crate::error::{CacheError, CacheResult, validate_key};
use crate::serializer::Serializer;
use crate::traits::{BlobStore, CacheCodec, CacheRepository};

const BACKEND: &str = "SharedCache";

/// Latest instant handed to a store (u32 unix seconds, year 2106)
const MAX_EXPIRES_AT: Duration = Duration::from_secs(u32::MAX as u64);

/// Lifetime of the health check probe blob
const HEALTH_CHECK_TTL: Duration = Duration::from_secs(10);

/// Distributed blob-store-backed cache repository
///
/// Every stored value, native or enveloped, is encoded as MessagePack before
/// it reaches the store. Entries expire at `now + valid_for`, or at
/// `now + region expiration` when `valid_for` is zero. `clear()` only touches
/// this repository's region.
pub struct SharedCacheRepository<B, C: CacheCodec = JsonCodec> {
    /// Injected store handle
    store: Arc<B>,
    region: RegionConfig,
    serializer: Option<Serializer<C>>,
    counters: OperationCounters,
}

impl<B: BlobStore> SharedCacheRepository<B, JsonCodec> {
    /// Create a repository that stores values natively (no serializer)
    pub fn new(store: Arc<B>, region: RegionConfig) -> Self {
        info!(
            region = %region.region_name,
            store = store.name(),
            "Initializing Shared Cache Repository"
        );
        if let Err(e) = region.validate() {
            warn!(error = %e, "[SharedCache] Region settings are invalid; defaults apply where needed");
        }
        Self {
            store,
            region,
            serializer: None,
            counters: OperationCounters::default(),
        }
    }
}

impl<B: BlobStore, C: CacheCodec> SharedCacheRepository<B, C> {
    /// Store every value in an envelope produced by `serializer`
    pub fn with_serializer<C2: CacheCodec>(self, serializer: Serializer<C2>) -> SharedCacheRepository<B, C2> {
        debug!(pipeline = %serializer.describe(), "[SharedCache] Serializer configured");
        self.with_optional_serializer(Some(serializer))
    }

    pub(crate) fn with_optional_serializer<C2: CacheCodec>(
        self,
        serializer: Option<Serializer<C2>>,
    ) -> SharedCacheRepository<B, C2> {
        SharedCacheRepository {
            store: self.store,
            region: self.region,
            serializer,
            counters: self.counters,
        }
    }

    pub fn serializer(&self) -> Option<&Serializer<C>> {
        self.serializer.as_ref()
    }

    pub fn store(&self) -> &Arc<B> {
        &self.store
    }

    /// Absolute expiration for a write issued at `now`.
    pub fn expires_at(&self, valid_for: Duration, now: SystemTime) -> SystemTime {
        let ttl = self.region.resolve_ttl(valid_for);
        now.checked_add(ttl)
            .unwrap_or(UNIX_EPOCH + MAX_EXPIRES_AT)
            .min(UNIX_EPOCH + MAX_EXPIRES_AT)
    }
}

// ===== Trait Implementations =====

#[async_trait]
impl<B, C> CacheRepository for SharedCacheRepository<B, C>
where
    B: BlobStore + 'static,
    C: CacheCodec + 'static,
{
    async fn get<T>(&self, key: &str) -> CacheResult<Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        validate_key(key)?;

        let raw = self
            .store
            .get(&self.region.region_name, key)
            .await
            .map_err(|e| CacheError::backend(BACKEND, e))?;

        let Some(bytes) = raw else {
            self.counters.miss();
            debug!(key = %key, region = %self.region.region_name, "[SharedCache] Cache miss");
            return Ok(None);
        };

        self.counters.hit();
        let stored: StoredValue =
            MsgPackCodec
                .deserialize(&bytes)
                .map_err(|e| CacheError::Corrupted {
                    key: key.to_string(),
                    reason: e.to_string(),
                })?;
        stored.decode(key, self.serializer.as_ref()).map(Some)
    }

    async fn set<T>(&self, key: &str, value: &T, valid_for: Duration) -> CacheResult<()>
    where
        T: Serialize + Sync + ?Sized,
    {
        validate_key(key)?;

        let stored = StoredValue::encode(key, value, self.serializer.as_ref())?;
        let bytes = MsgPackCodec
            .serialize(&stored)
            .map_err(|source| CacheError::Serialization {
                key: key.to_string(),
                source,
            })?;
        let expires_at = self.expires_at(valid_for, SystemTime::now());

        self.store
            .insert(&self.region.region_name, key, &bytes, expires_at)
            .await
            .map_err(|e| CacheError::backend(BACKEND, e))?;

        self.counters.set();
        debug!(
            key = %key,
            region = %self.region.region_name,
            ttl_secs = self.region.resolve_ttl(valid_for).as_secs(),
            wrapped = stored.is_wrapped(),
            "[SharedCache] Stored key"
        );
        Ok(())
    }

    async fn remove(&self, key: &str) -> CacheResult<()> {
        validate_key(key)?;

        self.store
            .remove(&self.region.region_name, key)
            .await
            .map_err(|e| CacheError::backend(BACKEND, e))?;
        self.counters.remove();
        debug!(key = %key, region = %self.region.region_name, "[SharedCache] Removed key");
        Ok(())
    }

    async fn clear(&self) -> CacheResult<()> {
        let removed = self
            .store
            .clear_region(&self.region.region_name)
            .await
            .map_err(|e| CacheError::backend(BACKEND, e))?;
        info!(
            region = %self.region.region_name,
            removed = removed,
            "[SharedCache] Cleared region"
        );
        Ok(())
    }

    async fn health_check(&self) -> bool {
        let region = &self.region.region_name;
        let test_key = format!("health_check_shared_{}", uuid::Uuid::new_v4().simple());
        let test_value = b"ok";

        match self
            .store
            .insert(region, &test_key, test_value, SystemTime::now() + HEALTH_CHECK_TTL)
            .await
        {
            Ok(()) => {
                let healthy = match self.store.get(region, &test_key).await {
                    Ok(Some(bytes)) => bytes.as_slice() == test_value.as_slice(),
                    _ => false,
                };
                if let Err(e) = self.store.remove(region, &test_key).await {
                    warn!(key = %test_key, error = %e, "[SharedCache] Health check key not removed");
                }
                healthy
            }
            Err(_) => false,
        }
    }

    fn region(&self) -> &RegionConfig {
        &self.region
    }

    fn supports_per_item_expiration(&self) -> bool {
        true
    }

    fn stats(&self) -> RepositoryStats {
        self.counters.snapshot()
    }

    fn name(&self) -> &'static str {
        BACKEND
    }
}

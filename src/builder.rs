//! Cache Repository Builder
//!
//! Assembles repository adapters from a region and an optional serializer
//! pipeline, either configured by hand or looked up in [`CacheSettings`].
//!
//! # Example: Region From Settings
//!
//! ```rust
//! use std::sync::Arc;
//! use cache_repository::{CacheRepositoryBuilder, CacheSettings, DashMapBlobStore, MsgPackCodec, Serializer};
//!
//! # fn example() -> cache_repository::CacheResult<()> {
//! let settings = CacheSettings::from_json_str(
//!     r#"{ "regions": [{ "region": "orders", "expiration": "00:10:00" }] }"#,
//! )?;
//!
//! let cache = CacheRepositoryBuilder::from_settings(&settings, "orders")?
//!     .serializer(Serializer::new(MsgPackCodec))
//!     .build_shared(Arc::new(DashMapBlobStore::new()))?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tracing::info;

use crate::backends::{MemcachedRepository, SharedCacheRepository};
use crate::codecs::JsonCodec;
use crate::config::{CacheSettings, RegionConfig};
use crate::error::{CacheError, CacheResult};
use crate::serializer::Serializer;
use crate::traits::{BlobStore, CacheCodec, MemcachedClient};

/// Builder for repository adapters
///
/// # Default Behavior
///
/// Without further configuration the builder produces adapters for the
/// `"default"` region (1 hour expiration) that store values natively.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use cache_repository::{CacheRepositoryBuilder, DashMapMemcached, RegionConfig};
///
/// # fn example() -> cache_repository::CacheResult<()> {
/// let cache = CacheRepositoryBuilder::new()
///     .region(RegionConfig::new("sessions"))
///     .apply_item_expiration(true)
///     .build_memcached(Arc::new(DashMapMemcached::new()))?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CacheRepositoryBuilder<C: CacheCodec = JsonCodec> {
    region: RegionConfig,
    serializer: Option<Serializer<C>>,
    apply_item_expiration: bool,
    #[cfg(feature = "compression")]
    compress: bool,
}

impl CacheRepositoryBuilder<JsonCodec> {
    pub fn new() -> Self {
        Self {
            region: RegionConfig::default(),
            serializer: None,
            apply_item_expiration: false,
            #[cfg(feature = "compression")]
            compress: false,
        }
    }

    /// Start from the region named `region_name` in `settings`
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Config` if the settings are invalid or have no
    /// such region.
    pub fn from_settings(settings: &CacheSettings, region_name: &str) -> CacheResult<Self> {
        settings.validate()?;
        let region = settings.region(region_name).ok_or_else(|| {
            CacheError::Config(format!("region '{region_name}' is not configured"))
        })?;
        Ok(Self::new().region(region.clone()))
    }
}

impl Default for CacheRepositoryBuilder<JsonCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: CacheCodec> CacheRepositoryBuilder<C> {
    #[must_use]
    pub fn region(mut self, region: RegionConfig) -> Self {
        self.region = region;
        self
    }

    /// Store values in envelopes produced by `serializer`
    pub fn serializer<C2: CacheCodec>(self, serializer: Serializer<C2>) -> CacheRepositoryBuilder<C2> {
        CacheRepositoryBuilder {
            region: self.region,
            serializer: Some(serializer),
            apply_item_expiration: self.apply_item_expiration,
            #[cfg(feature = "compression")]
            compress: self.compress,
        }
    }

    /// Apply `valid_for` on memcached writes (ignored by blob stores, which always do)
    #[must_use]
    pub fn apply_item_expiration(mut self, enabled: bool) -> Self {
        self.apply_item_expiration = enabled;
        self
    }

    /// Append a deflate stage using the region's compression threshold
    ///
    /// Only takes effect together with [`serializer`](Self::serializer).
    #[cfg(feature = "compression")]
    #[must_use]
    pub fn compressed(mut self) -> Self {
        self.compress = true;
        self
    }

    /// Build a repository over a memcached client
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Config` if the region is invalid.
    pub fn build_memcached<M: MemcachedClient>(self, client: Arc<M>) -> CacheResult<MemcachedRepository<M, C>> {
        let (region, serializer, apply_item_expiration) = self.finish()?;
        let repository = MemcachedRepository::new(client, region).with_item_expiration(apply_item_expiration);
        Ok(repository.with_optional_serializer(serializer))
    }

    /// Build a repository over a shared blob store
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Config` if the region is invalid.
    pub fn build_shared<B: BlobStore>(self, store: Arc<B>) -> CacheResult<SharedCacheRepository<B, C>> {
        let (region, serializer, _) = self.finish()?;
        let repository = SharedCacheRepository::new(store, region);
        Ok(repository.with_optional_serializer(serializer))
    }

    fn finish(self) -> CacheResult<(RegionConfig, Option<Serializer<C>>, bool)> {
        self.region.validate()?;

        #[cfg(feature = "compression")]
        let serializer = match self.serializer {
            Some(serializer) if self.compress => Some(serializer.compressed(self.region.compress_threshold)),
            other => other,
        };
        #[cfg(not(feature = "compression"))]
        let serializer = self.serializer;

        info!(
            region = %self.region.region_name,
            pipeline = %serializer.as_ref().map_or_else(|| "native".to_string(), Serializer::describe),
            apply_item_expiration = self.apply_item_expiration,
            "Building cache repository"
        );
        Ok((self.region, serializer, self.apply_item_expiration))
    }
}

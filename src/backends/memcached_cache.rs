//! Memcached Repository - Native-Capable Backend
//!
//! Memcached-based repository that keeps text and integers in memcached's own
//! representation and everything else as JSON, or as a serialized envelope when
//! a serializer is configured.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::{OperationCounters, RepositoryStats};
use crate::codecs::JsonCodec;
use crate::config::RegionConfig;
use crate::envelope::{CacheItem, StoredValue};
use crate::error::{CacheError, CacheResult, validate_key};
use crate::serializer::Serializer;
use crate::traits::{CacheCodec, CacheRepository, MemcachedClient};

const BACKEND: &str = "Memcached";

/// Longest expiration memcached interprets as relative seconds (30 days)
pub const MAX_RELATIVE_EXPIRATION: u64 = 60 * 60 * 24 * 30;

/// Longest key memcached accepts, in bytes
pub const MAX_KEY_LENGTH: usize = 250;

/// Lifetime of the health check probe item, in seconds
const HEALTH_CHECK_EXPIRATION: u32 = 10;

/// Item flags describing how the payload bytes are laid out
pub mod flags {
    /// UTF-8 text
    pub const TEXT: u32 = 0;
    /// Decimal ASCII integer (usable with memcached `incr`/`decr`)
    pub const INTEGER: u32 = 1;
    /// Any other JSON value
    pub const JSON: u32 = 2;
    /// `u16` big-endian type-name length, type name, serialized data
    pub const ENVELOPE: u32 = 3;
}

/// Memcached-backed cache repository
///
/// **Expiration**: by default writes use memcached's unconditional `set` with
/// expiration `0`, so `valid_for` is accepted but not applied and entries live
/// until the server evicts them. `supports_per_item_expiration()` reports
/// `false` in that mode. [`with_item_expiration(true)`](Self::with_item_expiration)
/// passes the resolved lifetime to the server instead.
///
/// **Clear**: memcached has no regions, so `clear()` flushes every server.
pub struct MemcachedRepository<M, C: CacheCodec = JsonCodec> {
    /// Injected client handle
    client: Arc<M>,
    region: RegionConfig,
    serializer: Option<Serializer<C>>,
    apply_item_expiration: bool,
    counters: OperationCounters,
}

impl<M: MemcachedClient> MemcachedRepository<M, JsonCodec> {
    /// Create a repository that stores values natively (no serializer)
    pub fn new(client: Arc<M>, region: RegionConfig) -> Self {
        info!(
            region = %region.region_name,
            client = client.name(),
            "Initializing Memcached Repository"
        );
        if let Err(e) = region.validate() {
            warn!(error = %e, "[Memcached] Region settings are invalid; defaults apply where needed");
        }
        Self {
            client,
            region,
            serializer: None,
            apply_item_expiration: false,
            counters: OperationCounters::default(),
        }
    }
}

impl<M: MemcachedClient, C: CacheCodec> MemcachedRepository<M, C> {
    /// Store every value in an envelope produced by `serializer`
    pub fn with_serializer<C2: CacheCodec>(self, serializer: Serializer<C2>) -> MemcachedRepository<M, C2> {
        debug!(pipeline = %serializer.describe(), "[Memcached] Serializer configured");
        self.with_optional_serializer(Some(serializer))
    }

    pub(crate) fn with_optional_serializer<C2: CacheCodec>(
        self,
        serializer: Option<Serializer<C2>>,
    ) -> MemcachedRepository<M, C2> {
        MemcachedRepository {
            client: self.client,
            region: self.region,
            serializer,
            apply_item_expiration: self.apply_item_expiration,
            counters: self.counters,
        }
    }

    /// Route writes through the TTL-aware store so `valid_for` is honored
    #[must_use]
    pub fn with_item_expiration(mut self, enabled: bool) -> Self {
        self.apply_item_expiration = enabled;
        self
    }

    pub fn serializer(&self) -> Option<&Serializer<C>> {
        self.serializer.as_ref()
    }

    pub fn client(&self) -> &Arc<M> {
        &self.client
    }

    fn expiration_for(&self, key: &str, valid_for: Duration) -> u32 {
        if self.apply_item_expiration {
            return memcached_expiration(self.region.resolve_ttl(valid_for), SystemTime::now());
        }
        if !valid_for.is_zero() {
            warn!(
                key = %key,
                valid_for_secs = valid_for.as_secs(),
                "[Memcached] Per-item expiration not applied; entry uses the server default"
            );
        }
        0
    }
}

/// Reject keys the memcached text protocol cannot carry.
///
/// On top of [`validate_key`], keys must fit in [`MAX_KEY_LENGTH`] bytes and
/// contain no whitespace or control characters, which would split or end the
/// command line they are written into.
///
/// # Errors
///
/// Returns [`CacheError::InvalidKey`] for any such key.
pub fn validate_memcached_key(key: &str) -> CacheResult<()> {
    validate_key(key)?;
    if key.len() > MAX_KEY_LENGTH || key.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(CacheError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Convert a lifetime to memcached's expiration field.
///
/// Lifetimes are rounded up to whole seconds (minimum one). Anything longer
/// than [`MAX_RELATIVE_EXPIRATION`] is sent as an absolute unix timestamp,
/// since memcached would read it as one anyway.
pub fn memcached_expiration(ttl: Duration, now: SystemTime) -> u32 {
    let secs = (ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0)).max(1);
    if secs <= MAX_RELATIVE_EXPIRATION {
        return u32::try_from(secs).unwrap_or(u32::MAX);
    }
    let unix_now = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    u32::try_from(unix_now.saturating_add(secs)).unwrap_or(u32::MAX)
}

/// Lay out a stored value as memcached bytes and flags.
///
/// # Errors
///
/// Returns [`CacheError::Serialization`] if the value cannot be framed.
pub fn encode_frame(key: &str, value: &StoredValue) -> CacheResult<(Vec<u8>, u32)> {
    match value {
        StoredValue::Native(serde_json::Value::String(text)) => {
            Ok((text.as_bytes().to_vec(), flags::TEXT))
        }
        StoredValue::Native(serde_json::Value::Number(n)) if n.is_i64() || n.is_u64() => {
            Ok((n.to_string().into_bytes(), flags::INTEGER))
        }
        StoredValue::Native(other) => serde_json::to_vec(other)
            .map(|bytes| (bytes, flags::JSON))
            .map_err(|e| CacheError::Serialization {
                key: key.to_string(),
                source: e.into(),
            }),
        StoredValue::Wrapped(item) => {
            let type_len =
                u16::try_from(item.item_type.len()).map_err(|_| CacheError::Serialization {
                    key: key.to_string(),
                    source: anyhow::anyhow!("type name too long: {}", item.item_type.len()),
                })?;
            let mut bytes = Vec::with_capacity(2 + item.item_type.len() + item.item_data.len());
            bytes.extend_from_slice(&type_len.to_be_bytes());
            bytes.extend_from_slice(item.item_type.as_bytes());
            bytes.extend_from_slice(&item.item_data);
            Ok((bytes, flags::ENVELOPE))
        }
    }
}

/// Read back what [`encode_frame`] wrote.
///
/// # Errors
///
/// Returns [`CacheError::Corrupted`] if the bytes do not match their flags.
pub fn decode_frame(key: &str, bytes: Vec<u8>, item_flags: u32) -> CacheResult<StoredValue> {
    let corrupted = |reason: String| CacheError::Corrupted {
        key: key.to_string(),
        reason,
    };

    match item_flags {
        flags::TEXT => String::from_utf8(bytes)
            .map(|text| StoredValue::Native(serde_json::Value::String(text)))
            .map_err(|e| corrupted(format!("text is not UTF-8: {e}"))),
        flags::INTEGER => {
            let text = std::str::from_utf8(&bytes)
                .map_err(|e| corrupted(format!("integer is not UTF-8: {e}")))?
                .trim();
            let number = if let Ok(n) = text.parse::<i64>() {
                serde_json::Number::from(n)
            } else if let Ok(n) = text.parse::<u64>() {
                serde_json::Number::from(n)
            } else {
                return Err(corrupted(format!("invalid integer '{text}'")));
            };
            Ok(StoredValue::Native(serde_json::Value::Number(number)))
        }
        flags::JSON => serde_json::from_slice(&bytes)
            .map(StoredValue::Native)
            .map_err(|e| corrupted(format!("invalid JSON: {e}"))),
        flags::ENVELOPE => {
            let Some((len_bytes, rest)) = bytes.split_first_chunk::<2>() else {
                return Err(corrupted("envelope header truncated".to_string()));
            };
            let type_len = usize::from(u16::from_be_bytes(*len_bytes));
            if rest.len() < type_len {
                return Err(corrupted("envelope type name truncated".to_string()));
            }
            let (type_bytes, data) = rest.split_at(type_len);
            let item_type = std::str::from_utf8(type_bytes)
                .map_err(|e| corrupted(format!("envelope type name is not UTF-8: {e}")))?;
            Ok(StoredValue::Wrapped(CacheItem::new(item_type, data.to_vec())))
        }
        other => Err(corrupted(format!("unknown item flags {other}"))),
    }
}

// ===== Trait Implementations =====

#[async_trait]
impl<M, C> CacheRepository for MemcachedRepository<M, C>
where
    M: MemcachedClient + 'static,
    C: CacheCodec + 'static,
{
    async fn get<T>(&self, key: &str) -> CacheResult<Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        validate_memcached_key(key)?;

        let raw = self
            .client
            .get(key)
            .await
            .map_err(|e| CacheError::backend(BACKEND, e))?;

        let Some((bytes, item_flags)) = raw else {
            self.counters.miss();
            debug!(key = %key, "[Memcached] Cache miss");
            return Ok(None);
        };

        self.counters.hit();
        let stored = decode_frame(key, bytes, item_flags)?;
        stored.decode(key, self.serializer.as_ref()).map(Some)
    }

    async fn set<T>(&self, key: &str, value: &T, valid_for: Duration) -> CacheResult<()>
    where
        T: Serialize + Sync + ?Sized,
    {
        validate_memcached_key(key)?;

        let stored = StoredValue::encode(key, value, self.serializer.as_ref())?;
        let (bytes, item_flags) = encode_frame(key, &stored)?;
        let expiration = self.expiration_for(key, valid_for);

        self.client
            .set(key, &bytes, item_flags, expiration)
            .await
            .map_err(|e| CacheError::backend(BACKEND, e))?;

        self.counters.set();
        debug!(
            key = %key,
            flags = item_flags,
            expiration = expiration,
            size = bytes.len(),
            "[Memcached] Stored key"
        );
        Ok(())
    }

    async fn remove(&self, key: &str) -> CacheResult<()> {
        validate_memcached_key(key)?;

        let existed = self
            .client
            .delete(key)
            .await
            .map_err(|e| CacheError::backend(BACKEND, e))?;
        self.counters.remove();
        debug!(key = %key, existed = existed, "[Memcached] Removed key");
        Ok(())
    }

    async fn clear(&self) -> CacheResult<()> {
        self.client
            .flush()
            .await
            .map_err(|e| CacheError::backend(BACKEND, e))?;
        info!(region = %self.region.region_name, "[Memcached] Flushed all servers");
        Ok(())
    }

    async fn health_check(&self) -> bool {
        let test_key = format!("health_check_memcached_{}", uuid::Uuid::new_v4().simple());
        let test_value = b"ok";

        match self
            .client
            .set(&test_key, test_value, flags::TEXT, HEALTH_CHECK_EXPIRATION)
            .await
        {
            Ok(()) => {
                let healthy = match self.client.get(&test_key).await {
                    Ok(Some((bytes, item_flags))) => {
                        bytes.as_slice() == test_value.as_slice() && item_flags == flags::TEXT
                    }
                    _ => false,
                };
                if let Err(e) = self.client.delete(&test_key).await {
                    warn!(key = %test_key, error = %e, "[Memcached] Health check key not removed");
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
        self.apply_item_expiration
    }

    fn stats(&self) -> RepositoryStats {
        self.counters.snapshot()
    }

    fn name(&self) -> &'static str {
        BACKEND
    }
}

// ===== memcache::Client =====

#[cfg(feature = "memcached")]
mod native_client {
    use std::io::Write;

    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use tracing::info;

    use crate::traits::MemcachedClient;

    /// Outgoing payload with explicit flags
    struct FlaggedSlice<'a> {
        bytes: &'a [u8],
        flags: u32,
    }

    impl<W: Write> memcache::ToMemcacheValue<W> for FlaggedSlice<'_> {
        fn get_flags(&self) -> u32 {
            self.flags
        }

        fn get_length(&self) -> usize {
            self.bytes.len()
        }

        fn write_to(&self, stream: &mut W) -> std::io::Result<()> {
            stream.write_all(self.bytes)
        }
    }

    /// Incoming payload with its flags
    struct FlaggedBytes {
        bytes: Vec<u8>,
        flags: u32,
    }

    impl memcache::FromMemcacheValue for FlaggedBytes {
        fn from_memcache_value(value: Vec<u8>, flags: u32) -> Result<Self, memcache::MemcacheError> {
            Ok(Self {
                bytes: value,
                flags,
            })
        }
    }

    /// Connect to memcached and verify the servers answer `version`
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be created or no server responds.
    pub fn connect(memcached_url: &str) -> Result<memcache::Client> {
        info!(url = %memcached_url, "Connecting to Memcached");

        let client = memcache::connect(memcached_url)
            .map_err(|e| anyhow!("Failed to connect to Memcached: {e}"))?;

        let versions = client
            .version()
            .map_err(|e| anyhow!("Memcached connection test failed: {e}"))?;
        info!(
            url = %memcached_url,
            server_count = versions.len(),
            "Memcached connected successfully"
        );
        Ok(client)
    }

    /// Connect using `MEMCACHED_URL` (default `memcache://127.0.0.1:11211`)
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be created or no server responds.
    pub fn connect_from_env() -> Result<memcache::Client> {
        let memcached_url = std::env::var("MEMCACHED_URL")
            .unwrap_or_else(|_| "memcache://127.0.0.1:11211".to_string());
        connect(&memcached_url)
    }

    #[async_trait]
    impl MemcachedClient for memcache::Client {
        async fn get(&self, key: &str) -> Result<Option<(Vec<u8>, u32)>> {
            let value = memcache::Client::get::<FlaggedBytes>(self, key)
                .map_err(|e| anyhow!("Memcached GET failed: {e}"))?;
            Ok(value.map(|v| (v.bytes, v.flags)))
        }

        async fn set(&self, key: &str, value: &[u8], flags: u32, expiration: u32) -> Result<()> {
            memcache::Client::set(self, key, FlaggedSlice { bytes: value, flags }, expiration)
                .map_err(|e| anyhow!("Memcached SET failed: {e}"))
        }

        async fn delete(&self, key: &str) -> Result<bool> {
            memcache::Client::delete(self, key).map_err(|e| anyhow!("Memcached DELETE failed: {e}"))
        }

        async fn flush(&self) -> Result<()> {
            memcache::Client::flush(self).map_err(|e| anyhow!("Memcached FLUSH failed: {e}"))
        }

        fn name(&self) -> &'static str {
            "memcache"
        }
    }
}

#[cfg(feature = "memcached")]
pub use native_client::{connect, connect_from_env};

//! Redis Blob Store - Distributed Shared Cache
//!
//! Redis used as the blob-only shared cache: values are opaque byte strings,
//! keys are laid out as `{region_len}:{region}:{key}`, and every write carries
//! an absolute expiration (`SET ... PXAT`).

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Redis blob store with `ConnectionManager` for automatic reconnection
pub struct RedisBlobStore {
    /// Redis connection manager - handles reconnection automatically
    conn_manager: ConnectionManager,
}

impl RedisBlobStore {
    /// Create a new store from `REDIS_URL` (default `redis://127.0.0.1:6379`)
    /// # Errors
    ///
    /// Returns an error if the Redis client cannot be created or connection fails.
    pub async fn new() -> Result<Self> {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        Self::with_url(&redis_url).await
    }

    /// Create a new store with custom URL
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection string (e.g., `<redis://localhost:6379>`)
    /// # Errors
    ///
    /// Returns an error if the Redis client cannot be created or connection fails.
    pub async fn with_url(redis_url: &str) -> Result<Self> {
        info!(redis_url = %redis_url, "Initializing Redis Blob Store with ConnectionManager");

        let client = Client::open(redis_url)
            .with_context(|| format!("Failed to create Redis client with URL: {redis_url}"))?;

        let conn_manager = ConnectionManager::new(client)
            .await
            .context("Failed to establish Redis connection manager")?;

        // Test connection
        let mut conn = conn_manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("Redis PING health check failed")?;

        info!(redis_url = %redis_url, "Redis Blob Store connected successfully");

        Ok(Self { conn_manager })
    }

    /// Scan keys matching a pattern (glob-style: *, ?, [])
    ///
    /// Uses the cursor-based SCAN command, which does not block the server
    /// the way KEYS does.
    /// # Errors
    ///
    /// Returns an error if the Redis command fails.
    pub async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.conn_manager.clone();
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let result: (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;

            cursor = result.0;
            keys.extend(result.1);

            // Cursor 0 means iteration is complete
            if cursor == 0 {
                break;
            }
        }

        debug!(pattern = %pattern, count = keys.len(), "[Redis] Scanned keys matching pattern");
        Ok(keys)
    }

    /// Remove multiple keys at once (bulk delete)
    /// # Errors
    ///
    /// Returns an error if the Redis command fails.
    pub async fn remove_bulk(&self, keys: &[String]) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn_manager.clone();
        let count: usize = conn.del(keys).await?;
        debug!(count = count, "[Redis] Removed keys in bulk");
        Ok(count)
    }
}

/// Physical Redis key of `key` in `region`
///
/// The region is prefixed with its byte length, so a `:` inside a region
/// name or key cannot make two regions share a key.
pub fn storage_key(region: &str, key: &str) -> String {
    format!("{}:{region}:{key}", region.len())
}

/// SCAN pattern matching every key of `region`, with glob characters escaped
pub fn region_pattern(region: &str) -> String {
    let mut pattern = format!("{}:", region.len());
    for c in region.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push_str(":*");
    pattern
}

/// Milliseconds since the unix epoch, at least 1 so Redis accepts it
fn unix_millis(at: SystemTime) -> u64 {
    let millis = at
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    u64::try_from(millis).unwrap_or(u64::MAX).max(1)
}

// ===== Trait Implementations =====

use crate::traits::BlobStore;
use async_trait::async_trait;

/// Implement `BlobStore` trait for `RedisBlobStore`
#[async_trait]
impl BlobStore for RedisBlobStore {
    async fn get(&self, region: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn_manager.clone();
        let value: Option<Vec<u8>> = conn.get(storage_key(region, key)).await?;
        Ok(value)
    }

    async fn insert(
        &self,
        region: &str,
        key: &str,
        value: &[u8],
        expires_at: SystemTime,
    ) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let at = unix_millis(expires_at);

        let _: () = redis::cmd("SET")
            .arg(storage_key(region, key))
            .arg(value)
            .arg("PXAT")
            .arg(at)
            .query_async(&mut conn)
            .await?;
        debug!(region = %region, key = %key, expires_at_ms = at, "[Redis] Stored blob");
        Ok(())
    }

    async fn remove(&self, region: &str, key: &str) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let _: () = conn.del(storage_key(region, key)).await?;
        Ok(())
    }

    async fn clear_region(&self, region: &str) -> Result<usize> {
        let keys = self.scan_keys(&region_pattern(region)).await?;
        self.remove_bulk(&keys).await
    }

    fn name(&self) -> &'static str {
        "Redis"
    }
}

//! Lazily constructed client handles
//!
//! Repositories take their client at construction time. When the real
//! connection should only be opened on first use, wrap its factory in a
//! [`LazyClient`] and inject that instead: concurrent first callers share a
//! single construction, and a failed construction is retried by the next call.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::Result;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use tokio::sync::OnceCell;
use tracing::info;

use crate::traits::{BlobStore, MemcachedClient};

type Factory<T> = Box<dyn Fn() -> BoxFuture<'static, Result<T>> + Send + Sync>;

/// Client built on first use
///
/// ```rust
/// use std::sync::Arc;
/// use cache_repository::backends::{DashMapMemcached, MemcachedRepository};
/// use cache_repository::{LazyClient, RegionConfig};
///
/// let client = LazyClient::new(|| async { Ok::<_, anyhow::Error>(DashMapMemcached::new()) });
/// let cache = MemcachedRepository::new(Arc::new(client), RegionConfig::default());
/// ```
pub struct LazyClient<T> {
    cell: OnceCell<Arc<T>>,
    factory: Factory<T>,
}

impl<T: Send + Sync + 'static> LazyClient<T> {
    pub fn new<F, Fut>(factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            cell: OnceCell::new(),
            factory: Box::new(move || Box::pin(factory())),
        }
    }

    /// The client, constructing it if this is the first call
    ///
    /// # Errors
    ///
    /// Returns the factory's error; the next call tries again.
    pub async fn client(&self) -> Result<&Arc<T>> {
        self.cell
            .get_or_try_init(|| async {
                let client = (self.factory)().await?;
                info!(
                    client = std::any::type_name::<T>(),
                    "Lazily initialized cache client"
                );
                Ok::<_, anyhow::Error>(Arc::new(client))
            })
            .await
    }

    /// Whether the client has been constructed
    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}

impl<T> fmt::Debug for LazyClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyClient")
            .field("initialized", &self.cell.initialized())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<T: MemcachedClient + 'static> MemcachedClient for LazyClient<T> {
    async fn get(&self, key: &str) -> Result<Option<(Vec<u8>, u32)>> {
        self.client().await?.get(key).await
    }

    async fn set(&self, key: &str, value: &[u8], flags: u32, expiration: u32) -> Result<()> {
        self.client().await?.set(key, value, flags, expiration).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.client().await?.delete(key).await
    }

    async fn flush(&self) -> Result<()> {
        self.client().await?.flush().await
    }

    fn name(&self) -> &'static str {
        "lazy"
    }
}

#[async_trait]
impl<T: BlobStore + 'static> BlobStore for LazyClient<T> {
    async fn get(&self, region: &str, key: &str) -> Result<Option<Vec<u8>>> {
        self.client().await?.get(region, key).await
    }

    async fn insert(
        &self,
        region: &str,
        key: &str,
        value: &[u8],
        expires_at: SystemTime,
    ) -> Result<()> {
        self.client()
            .await?
            .insert(region, key, value, expires_at)
            .await
    }

    async fn remove(&self, region: &str, key: &str) -> Result<()> {
        self.client().await?.remove(region, key).await
    }

    async fn clear_region(&self, region: &str) -> Result<usize> {
        self.client().await?.clear_region(region).await
    }

    fn name(&self) -> &'static str {
        "lazy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::DashMapMemcached;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_concurrent_first_use_builds_once() {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&builds);
        let lazy = Arc::new(LazyClient::new(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                Ok::<_, anyhow::Error>(DashMapMemcached::new())
            }
        }));
        assert!(!lazy.is_initialized());

        let mut handles = Vec::new();
        for i in 0..16u32 {
            let lazy = Arc::clone(&lazy);
            handles.push(tokio::spawn(async move {
                lazy.set(&format!("k{i}"), b"v", 0, 0).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(lazy.is_initialized());
        assert_eq!(lazy.client().await.unwrap().len(), 16);
    }

    #[tokio::test]
    async fn test_failed_init_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let lazy = LazyClient::new(move || {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    anyhow::bail!("server not ready");
                }
                Ok::<_, anyhow::Error>(DashMapMemcached::new())
            }
        });

        assert!(MemcachedClient::get(&lazy, "k").await.is_err());
        assert!(!lazy.is_initialized());
        assert_eq!(MemcachedClient::get(&lazy, "k").await.unwrap(), None);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}

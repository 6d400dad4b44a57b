//! Common utilities for integration tests
//!
//! This module provides shared test infrastructure including:
//! - Repository setup over the in-process stores
//! - Live server URLs for the `#[ignore]`d tests
//! - Test data generators

#![allow(dead_code)]

use cache_repository::{
    CacheCodec, DashMapBlobStore, DashMapMemcached, MemcachedRepository, RegionConfig, Serializer,
    SharedCacheRepository,
};
use std::sync::Arc;

/// Get memcached URL from environment or use default
pub fn memcached_url() -> String {
    std::env::var("MEMCACHED_URL").unwrap_or_else(|_| "memcache://127.0.0.1:11211".to_string())
}

/// Get Redis URL from environment or use default
pub fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
}

/// Create a test key with unique suffix
pub fn test_key(name: &str) -> String {
    format!("test_{}_{}", name, rand::random::<u32>())
}

/// Memcached repository over a fresh in-process store, storing values natively
pub fn memcached_repository() -> (Arc<DashMapMemcached>, MemcachedRepository<DashMapMemcached>) {
    let client = Arc::new(DashMapMemcached::new());
    let repository = MemcachedRepository::new(Arc::clone(&client), RegionConfig::default());
    (client, repository)
}

/// Shared cache repository for `region` over `store`, using `serializer`
pub fn shared_repository<C: CacheCodec>(
    store: &Arc<DashMapBlobStore>,
    region: &str,
    serializer: Serializer<C>,
) -> SharedCacheRepository<DashMapBlobStore, C> {
    SharedCacheRepository::new(Arc::clone(store), RegionConfig::new(region)).with_serializer(serializer)
}

/// Generate test data of various types
pub mod test_data {
    use rand::RngCore;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct Task {
        pub summary: String,
        #[serde(with = "serde_bytes")]
        pub data: Vec<u8>,
    }

    impl Task {
        /// `Task {n}` with 512 random bytes of payload
        pub fn new(n: usize) -> Self {
            let mut data = vec![0u8; 512];
            rand::thread_rng().fill_bytes(&mut data);
            Self {
                summary: format!("Task {n}"),
                data,
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct User {
        pub id: u64,
        pub name: String,
        pub email: String,
        pub tags: Vec<String>,
        pub manager: Option<u64>,
    }

    impl User {
        pub fn new(id: u64) -> Self {
            Self {
                id,
                name: format!("User {id}"),
                email: format!("user{id}@example.com"),
                tags: vec!["staff".to_string(), format!("team-{}", id % 3)],
                manager: (id > 1).then_some(1),
            }
        }
    }

    /// Text long enough to cross a small compression threshold
    pub fn repetitive_text(len: usize) -> String {
        "cache ".repeat(len / 6 + 1).chars().take(len).collect()
    }
}

//! Basic Usage Example
//!
//! Demonstrates set, get, remove and clear on both repositories, using the
//! in-process stores so no server is needed.
//!
//! Run with: cargo run --example basic_usage

use std::sync::Arc;
use std::time::Duration;

use cache_repository::{
    CacheRepository, CacheRepositoryBuilder, CacheSettings, DashMapBlobStore, DashMapMemcached,
    LazyClient, MemcachedRepository, RegionConfig, USE_REGION_DEFAULT,
};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize, Deserialize)]
struct User {
    id: u64,
    name: String,
    roles: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    // 1. Memcached repository: integers and text stored natively
    let client = Arc::new(DashMapMemcached::new());
    let memcached = MemcachedRepository::new(client, RegionConfig::default());

    memcached.set("Item1", &1, USE_REGION_DEFAULT).await?;
    tracing::info!(value = ?memcached.get::<i32>("Item1").await?, "Item1 after first set");
    memcached.set("Item1", &4, USE_REGION_DEFAULT).await?;
    tracing::info!(value = ?memcached.get::<i32>("Item1").await?, "Item1 after overwrite");
    memcached.remove("Item1").await?;
    tracing::info!(value = ?memcached.get::<i32>("Item1").await?, "Item1 after remove");

    // 2. Shared cache repository from settings, built lazily on first use
    let settings = CacheSettings::from_json_str(
        r#"{
            "regions": [
                { "region": "users", "expiration": "00:05:00" },
                { "region": "sessions", "expiration": "00:00:30" }
            ]
        }"#,
    )?;
    let store = Arc::new(LazyClient::new(|| async { Ok::<_, anyhow::Error>(DashMapBlobStore::new()) }));
    let users = CacheRepositoryBuilder::from_settings(&settings, "users")?.build_shared(Arc::clone(&store))?;
    let sessions = CacheRepositoryBuilder::from_settings(&settings, "sessions")?.build_shared(store)?;

    let alice = User {
        id: 1,
        name: "Alice".to_string(),
        roles: vec!["admin".to_string()],
    };
    users.set("user:1", &alice, USE_REGION_DEFAULT).await?;
    sessions.set("session:abc", "user:1", Duration::from_secs(10)).await?;

    if let Some(user) = users.get::<User>("user:1").await? {
        tracing::info!(?user, "Retrieved from shared cache");
    }

    // 3. Clearing one region leaves the other alone
    sessions.clear().await?;
    tracing::info!(
        session = ?sessions.get::<String>("session:abc").await?,
        user_present = users.get::<User>("user:1").await?.is_some(),
        "After clearing sessions"
    );

    // 4. Health and statistics
    tracing::info!(
        memcached = memcached.health_check().await,
        shared = users.health_check().await,
        "Health check"
    );
    let stats = users.stats();
    tracing::info!(hits = stats.hits, misses = stats.misses, hit_rate = stats.hit_rate(), "Users region stats");

    Ok(())
}

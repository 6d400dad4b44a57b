//! Serializer Pipeline Example
//!
//! Stores the same record through envelope pipelines of increasing depth and
//! shows what ends up in the store.
//!
//! Run with: cargo run --example serializer_pipeline

use std::sync::Arc;

use cache_repository::backends::memcached_cache::{decode_frame, flags};
use cache_repository::{
    AesGcmStage, BsonCodec, CacheCodec, CacheRepository, DashMapMemcached, MemcachedClient,
    MemcachedRepository, MsgPackCodec, RegionConfig, Serializer, StoredValue, USE_REGION_DEFAULT,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Task {
    summary: String,
    #[serde(with = "serde_bytes")]
    data: Vec<u8>,
}

async fn store_with<C: CacheCodec + 'static>(
    client: &Arc<DashMapMemcached>,
    key: &str,
    serializer: Serializer<C>,
    task: &Task,
) -> anyhow::Result<()> {
    let pipeline = serializer.describe();
    let cache = MemcachedRepository::new(Arc::clone(client), RegionConfig::default()).with_serializer(serializer);

    cache.set(key, task, USE_REGION_DEFAULT).await?;
    let back = cache.get::<Task>(key).await?;

    if let Some((bytes, item_flags)) = client.get(key).await? {
        let stored_size = bytes.len();
        if let StoredValue::Wrapped(item) = decode_frame(key, bytes, item_flags)? {
            tracing::info!(
                pipeline = %pipeline,
                item_type = %item.item_type,
                envelope = item_flags == flags::ENVELOPE,
                stored_size,
                payload_size = item.item_data.len(),
                round_trip = back.as_ref() == Some(task),
                "Stored task"
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let mut data = vec![0u8; 512];
    rand::thread_rng().fill_bytes(&mut data);
    let task = Task {
        summary: "Task 0 ".repeat(200),
        data,
    };

    let client = Arc::new(DashMapMemcached::new());
    let key = AesGcmStage::generate_key();

    store_with(&client, "bson", Serializer::new(BsonCodec), &task).await?;
    store_with(&client, "msgpack", Serializer::new(MsgPackCodec), &task).await?;
    store_with(&client, "compressed", Serializer::new(MsgPackCodec).compressed(256), &task).await?;
    store_with(
        &client,
        "sealed",
        Serializer::new(BsonCodec).compressed(256).encrypted(&key)?,
        &task,
    )
    .await?;

    Ok(())
}

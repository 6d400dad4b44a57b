//! Integration tests for the memcached repository
//!
//! These run against the in-process `DashMapMemcached` store; the tests
//! marked `#[ignore]` need a memcached server at `MEMCACHED_URL`.

mod common;

use cache_repository::backends::memcached_cache::flags;
use cache_repository::{
    CacheError, CacheRepository, DashMapMemcached, JsonCodec, MemcachedClient, MemcachedRepository,
    MsgPackCodec, RegionConfig, Serializer, USE_REGION_DEFAULT,
};
use common::*;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// set 1, get 1, set 4, get 4, remove, get nothing
#[tokio::test]
async fn test_basic_cycle() {
    let (_, cache) = memcached_repository();

    cache.set("Item1", &1, USE_REGION_DEFAULT).await.unwrap();
    assert_eq!(cache.get::<i32>("Item1").await.unwrap(), Some(1));

    cache.set("Item1", &4, USE_REGION_DEFAULT).await.unwrap();
    assert_eq!(cache.get::<i32>("Item1").await.unwrap(), Some(4));

    cache.remove("Item1").await.unwrap();
    assert_eq!(cache.get::<i32>("Item1").await.unwrap(), None);

    let stats = cache.stats();
    assert_eq!(stats.sets, 2);
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.removes, 1);
}

/// Integers and text land in memcached's own representation
#[tokio::test]
async fn test_native_values_pass_through() {
    let (client, cache) = memcached_repository();
    let int_key = test_key("int");
    let text_key = test_key("text");

    cache.set(&int_key, &1234u64, USE_REGION_DEFAULT).await.unwrap();
    cache.set(&text_key, "hello", USE_REGION_DEFAULT).await.unwrap();

    assert_eq!(
        client.get(&int_key).await.unwrap(),
        Some((b"1234".to_vec(), flags::INTEGER))
    );
    assert_eq!(
        client.get(&text_key).await.unwrap(),
        Some((b"hello".to_vec(), flags::TEXT))
    );

    // Values written by another client are read the same way
    client.set("external", b"77", flags::INTEGER, 0).await.unwrap();
    assert_eq!(cache.get::<u64>("external").await.unwrap(), Some(77));
    assert_eq!(cache.get::<String>(&text_key).await.unwrap().as_deref(), Some("hello"));
}

#[tokio::test]
async fn test_structured_values_stored_as_json() {
    let (client, cache) = memcached_repository();
    let key = test_key("user");
    let user = test_data::User::new(7);

    cache.set(&key, &user, USE_REGION_DEFAULT).await.unwrap();

    let (_, item_flags) = client.get(&key).await.unwrap().unwrap();
    assert_eq!(item_flags, flags::JSON);
    assert_eq!(cache.get::<test_data::User>(&key).await.unwrap(), Some(user));
}

#[tokio::test]
async fn test_overwrite_last_write_wins() {
    let (_, cache) = memcached_repository();
    let key = test_key("overwrite");

    cache.set(&key, "first", USE_REGION_DEFAULT).await.unwrap();
    cache.set(&key, "second", USE_REGION_DEFAULT).await.unwrap();
    assert_eq!(cache.get::<String>(&key).await.unwrap().as_deref(), Some("second"));
}

#[tokio::test]
async fn test_remove_is_idempotent() {
    let (_, cache) = memcached_repository();
    let key = test_key("remove");

    cache.set(&key, &1, USE_REGION_DEFAULT).await.unwrap();
    cache.remove(&key).await.unwrap();
    cache.remove(&key).await.unwrap();
    cache.remove("never-written").await.unwrap();
    assert_eq!(cache.get::<i32>(&key).await.unwrap(), None);
}

#[tokio::test]
async fn test_clear_flushes_everything() {
    let (client, cache) = memcached_repository();
    for i in 0..5 {
        cache.set(&format!("k{i}"), &i, USE_REGION_DEFAULT).await.unwrap();
    }
    client.set("foreign", b"x", flags::TEXT, 0).await.unwrap();

    cache.clear().await.unwrap();

    assert!(client.is_empty());
    assert_eq!(cache.get::<i32>("k0").await.unwrap(), None);
}

#[tokio::test]
async fn test_invalid_keys_rejected() {
    let (client, cache) = memcached_repository();

    for key in ["", "   ", "\t\n"] {
        assert!(matches!(
            cache.set(key, &1, USE_REGION_DEFAULT).await,
            Err(CacheError::InvalidKey(_))
        ));
        assert!(matches!(
            cache.get::<i32>(key).await,
            Err(CacheError::InvalidKey(_))
        ));
        assert!(matches!(cache.remove(key).await, Err(CacheError::InvalidKey(_))));
    }

    // Nothing reached the store
    assert!(client.is_empty());
    assert_eq!(cache.stats().sets, 0);
}

/// Keys that would break the memcached text protocol never reach the client
#[tokio::test]
async fn test_protocol_unsafe_keys_rejected() {
    let (client, cache) = memcached_repository();
    cache.set("victim", &1, USE_REGION_DEFAULT).await.unwrap();

    let too_long = "k".repeat(251);
    for key in ["a\r\nflush_all", "victim other", " victim", "nul\0", too_long.as_str()] {
        assert!(matches!(
            cache.set(key, &2, USE_REGION_DEFAULT).await,
            Err(CacheError::InvalidKey(_))
        ));
        assert!(matches!(cache.get::<i32>(key).await, Err(CacheError::InvalidKey(_))));
        assert!(matches!(cache.remove(key).await, Err(CacheError::InvalidKey(_))));
    }

    assert_eq!(client.len(), 1);
    assert_eq!(cache.get::<i32>("victim").await.unwrap(), Some(1));
    assert!(cache.set(&"k".repeat(250), &3, USE_REGION_DEFAULT).await.is_ok());
}

#[tokio::test]
async fn test_valid_for_ignored_by_default() {
    let (client, cache) = memcached_repository();
    let key = test_key("ttl_default");

    assert!(!cache.supports_per_item_expiration());
    cache.set(&key, &1, Duration::from_secs(1)).await.unwrap();
    assert_eq!(client.expires_at(&key), None);
}

#[tokio::test]
async fn test_item_expiration_applies_valid_for() {
    let client = Arc::new(DashMapMemcached::new());
    let region = RegionConfig::new("sessions").with_expiration(Duration::from_secs(600));
    let cache = MemcachedRepository::new(Arc::clone(&client), region).with_item_expiration(true);
    assert!(cache.supports_per_item_expiration());

    let before = SystemTime::now();
    cache.set("short", &1, Duration::from_secs(30)).await.unwrap();
    cache.set("regional", &2, USE_REGION_DEFAULT).await.unwrap();

    let short = client.expires_at("short").unwrap();
    let regional = client.expires_at("regional").unwrap();
    assert!(short >= before + Duration::from_secs(30));
    assert!(short < before + Duration::from_secs(60));
    assert!(regional >= before + Duration::from_secs(600));
}

#[tokio::test]
async fn test_item_expiration_expires_entries() {
    let client = Arc::new(DashMapMemcached::new());
    let cache = MemcachedRepository::new(Arc::clone(&client), RegionConfig::default())
        .with_item_expiration(true);

    cache.set("brief", "soon gone", Duration::from_millis(100)).await.unwrap();
    assert!(cache.get::<String>("brief").await.unwrap().is_some());

    // Rounded up to one whole second
    tokio::time::sleep(Duration::from_millis(1_200)).await;
    assert_eq!(cache.get::<String>("brief").await.unwrap(), None);
}

#[tokio::test]
async fn test_envelope_round_trip() {
    let (client, cache) = memcached_repository();
    let cache = cache.with_serializer(Serializer::new(MsgPackCodec));
    let key = test_key("task");
    let task = test_data::Task::new(0);

    cache.set(&key, &task, USE_REGION_DEFAULT).await.unwrap();

    let (_, item_flags) = client.get(&key).await.unwrap().unwrap();
    assert_eq!(item_flags, flags::ENVELOPE);
    assert_eq!(cache.get::<test_data::Task>(&key).await.unwrap(), Some(task));

    // With a serializer even integers go through the envelope
    cache.set("n", &5u32, USE_REGION_DEFAULT).await.unwrap();
    assert_eq!(client.get("n").await.unwrap().map(|(_, f)| f), Some(flags::ENVELOPE));
    assert_eq!(cache.get::<u32>("n").await.unwrap(), Some(5));
}

/// Borrowed and literal values read back as their owned counterparts
#[tokio::test]
async fn test_envelope_reads_back_owned_types() {
    let (_, cache) = memcached_repository();
    let cache = cache.with_serializer(Serializer::new(JsonCodec));
    let user = test_data::User::new(5);

    cache.set("text", "hello", USE_REGION_DEFAULT).await.unwrap();
    cache.set("user", &&user, USE_REGION_DEFAULT).await.unwrap();
    cache.set("n", &5, USE_REGION_DEFAULT).await.unwrap();

    assert_eq!(cache.get::<String>("text").await.unwrap().as_deref(), Some("hello"));
    assert_eq!(cache.get::<test_data::User>("user").await.unwrap(), Some(user));
    assert_eq!(cache.get::<i64>("n").await.unwrap(), Some(5));
}

#[tokio::test]
async fn test_envelope_type_checked() {
    let (_, cache) = memcached_repository();
    let cache = cache.with_serializer(Serializer::new(JsonCodec));

    cache.set("user", &test_data::User::new(1), USE_REGION_DEFAULT).await.unwrap();
    assert!(matches!(
        cache.get::<test_data::Task>("user").await,
        Err(CacheError::TypeMismatch { .. })
    ));
}

#[tokio::test]
async fn test_envelope_without_serializer_is_reported() {
    let client = Arc::new(DashMapMemcached::new());
    let writer = MemcachedRepository::new(Arc::clone(&client), RegionConfig::default())
        .with_serializer(Serializer::new(JsonCodec));
    let reader = MemcachedRepository::new(Arc::clone(&client), RegionConfig::default());

    writer.set("wrapped", &[1, 2, 3], USE_REGION_DEFAULT).await.unwrap();
    assert!(matches!(
        reader.get::<Vec<i32>>("wrapped").await,
        Err(CacheError::SerializerMissing { .. })
    ));
}

#[tokio::test]
async fn test_stored_null_is_not_missing() {
    let (_, cache) = memcached_repository();

    cache.set("nothing", &Option::<u32>::None, USE_REGION_DEFAULT).await.unwrap();
    assert_eq!(cache.get::<Option<u32>>("nothing").await.unwrap(), Some(None));
    assert_eq!(cache.get::<Option<u32>>("absent").await.unwrap(), None);
}

#[tokio::test]
async fn test_health_check() {
    let (client, cache) = memcached_repository();
    assert!(cache.health_check().await);
    assert!(client.is_empty());

    // The probe does not count as caller traffic
    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses, stats.sets, stats.removes), (0, 0, 0, 0));
}

#[cfg(feature = "memcached")]
#[tokio::test]
#[ignore = "requires a memcached server at MEMCACHED_URL"]
async fn test_live_memcached_cycle() {
    let client = Arc::new(cache_repository::backends::connect(&memcached_url()).unwrap());
    let cache = MemcachedRepository::new(client, RegionConfig::default()).with_item_expiration(true);
    let key = test_key("live");

    cache.set(&key, &41u64, Duration::from_secs(30)).await.unwrap();
    assert_eq!(cache.get::<u64>(&key).await.unwrap(), Some(41));
    cache.set(&key, "forty-two", USE_REGION_DEFAULT).await.unwrap();
    assert_eq!(cache.get::<String>(&key).await.unwrap().as_deref(), Some("forty-two"));
    cache.remove(&key).await.unwrap();
    assert_eq!(cache.get::<u64>(&key).await.unwrap(), None);
    assert!(cache.health_check().await);
}

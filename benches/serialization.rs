//! Benchmarks for codecs and serializer pipelines

use cache_repository::backends::{DashMapBlobStore, SharedCacheRepository};
use cache_repository::{CacheCodec, CacheRepository, JsonCodec, MsgPackCodec, RegionConfig, Serializer, USE_REGION_DEFAULT};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::runtime::Runtime;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Task {
    summary: String,
    #[serde(with = "serde_bytes")]
    data: Vec<u8>,
}

impl Task {
    fn new(n: usize, size: usize) -> Self {
        let mut data = vec![0u8; size];
        rand::thread_rng().fill_bytes(&mut data);
        Self {
            summary: format!("Task {n}"),
            data,
        }
    }
}

fn bench_pipeline<C: CacheCodec>(c: &mut Criterion, label: &str, serializer: &Serializer<C>) {
    let mut group = c.benchmark_group(format!("pipeline/{label}"));

    for size in [512usize, 8_192, 65_536] {
        let task = Task::new(0, size);
        let bytes = serializer
            .serialize(&task)
            .unwrap_or_else(|e| panic!("serialize failed: {e}"));

        group.bench_with_input(BenchmarkId::new("serialize", size), &task, |b, task| {
            b.iter(|| serializer.serialize(black_box(task)));
        });
        group.bench_with_input(BenchmarkId::new("deserialize", size), &bytes, |b, bytes| {
            b.iter(|| serializer.deserialize::<Task>(black_box(bytes)));
        });
    }

    group.finish();
}

/// Benchmark every codec on its own
fn bench_codecs(c: &mut Criterion) {
    bench_pipeline(c, "json", &Serializer::new(JsonCodec));
    bench_pipeline(c, "msgpack", &Serializer::new(MsgPackCodec));
    #[cfg(feature = "bincode")]
    bench_pipeline(c, "bincode", &Serializer::new(cache_repository::BincodeCodec));
    #[cfg(feature = "bson")]
    bench_pipeline(c, "bson", &Serializer::new(cache_repository::BsonCodec));
}

/// Benchmark the cost of the byte stages
fn bench_stages(c: &mut Criterion) {
    #[cfg(feature = "compression")]
    bench_pipeline(c, "msgpack+deflate", &Serializer::new(MsgPackCodec).compressed(1_024));
    #[cfg(feature = "encryption")]
    {
        let key = cache_repository::AesGcmStage::generate_key();
        let serializer = Serializer::new(MsgPackCodec)
            .encrypted(&key)
            .unwrap_or_else(|e| panic!("invalid key: {e}"));
        bench_pipeline(c, "msgpack+aes", &serializer);
    }
    let _ = c;
}

/// Benchmark native vs enveloped storage through a repository
fn bench_repository(c: &mut Criterion) {
    let rt = Runtime::new().unwrap_or_else(|_| panic!("Failed to create runtime"));
    let store = Arc::new(DashMapBlobStore::new());
    let native = SharedCacheRepository::new(Arc::clone(&store), RegionConfig::new("native"));
    let wrapped = SharedCacheRepository::new(Arc::clone(&store), RegionConfig::new("wrapped"))
        .with_serializer(Serializer::new(MsgPackCodec));
    let task = Task::new(0, 512);

    let mut group = c.benchmark_group("repository");

    group.bench_function("native_set_get", |b| {
        b.to_async(&rt).iter(|| async {
            native.set("task", &task, USE_REGION_DEFAULT).await.ok();
            black_box(native.get::<Task>("task").await.ok())
        });
    });

    group.bench_function("envelope_set_get", |b| {
        b.to_async(&rt).iter(|| async {
            wrapped.set("task", &task, USE_REGION_DEFAULT).await.ok();
            black_box(wrapped.get::<Task>("task").await.ok())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_codecs, bench_stages, bench_repository);
criterion_main!(benches);

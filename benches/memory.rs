use std::hint::black_box;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use rand::Rng;
use tempfile::TempDir;
use tiercache::prelude::*;

fn filled(limit: usize) -> BoundedMemoryStore<u64, u64> {
    let store = BoundedMemoryStore::new("bench", limit, 0);
    for i in 0..limit as u64 {
        store.set(i, i);
    }
    store
}

fn bench_memory_insert_get(c: &mut Criterion) {
    c.bench_function("memory_insert_get", |b| {
        b.iter_batched(
            || filled(1024),
            |store| {
                for i in 0..1024u64 {
                    store.set(black_box(i + 10_000), i);
                    let _ = black_box(store.get(&black_box(i)));
                }
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_memory_eviction_churn(c: &mut Criterion) {
    c.bench_function("memory_eviction_churn", |b| {
        b.iter_batched(
            || {
                let store = filled(1024);
                store.set_observer(|key: &u64, _: &std::sync::Arc<u64>| {
                    black_box(key);
                });
                store
            },
            |store| {
                for i in 0..4096u64 {
                    store.set(black_box(10_000 + i), i);
                }
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_memory_random_hits(c: &mut Criterion) {
    let store = filled(4096);
    let mut rng = rand::rng();
    let keys: Vec<u64> = (0..4096).map(|_| rng.random_range(0..8192)).collect();
    c.bench_function("memory_random_hits", |b| {
        b.iter(|| {
            for key in &keys {
                let _ = black_box(store.get(key));
            }
        })
    });
}

fn bench_tiered_write_back(c: &mut Criterion) {
    let dir = TempDir::new().expect("temp dir");
    let cache = CacheBuilder::new("bench")
        .root(dir.path())
        .memory_count_limit(256)
        .build(BytesCodec)
        .expect("cache");
    let payload = vec![0xAB; 512];
    let mut next = 0u64;
    c.bench_function("tiered_put_with_write_back", |b| {
        b.iter(|| {
            for _ in 0..256 {
                next += 1;
                cache.put(format!("k{next}"), payload.clone());
            }
            cache.disk().flush_blocking().expect("flush");
        })
    });
}

criterion_group!(
    benches,
    bench_memory_insert_get,
    bench_memory_eviction_churn,
    bench_memory_random_hits,
    bench_tiered_write_back
);
criterion_main!(benches);

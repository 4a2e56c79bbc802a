//! Benchmarks for lock acquisition latency

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use lease_lock_core::prelude::*;
use lease_lock_core::MemoryLockStore;

fn bench_memory_lock_acquisition(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let manager = LockManager::new(MemoryLockStore::new());
    let spec = LockSpec::of(["bench", "lock"]).unwrap();

    let mut group = c.benchmark_group("memory_lock");
    group.bench_function("acquire_release", |b| {
        b.to_async(&runtime).iter(|| async {
            if let Some(lease) = manager.acquire(black_box(&spec)).await {
                manager.release(&lease).await;
            }
        });
    });

    let held = runtime.block_on(manager.acquire(&spec)).unwrap();
    group.bench_function("acquire_contended", |b| {
        b.to_async(&runtime)
            .iter(|| async { black_box(manager.acquire(&spec).await) });
    });
    runtime.block_on(manager.release(&held));

    group.bench_function("run_guarded", |b| {
        b.to_async(&runtime).iter(|| async {
            manager
                .run_guarded(&spec, || async { Ok::<_, std::io::Error>(()) })
                .await
        });
    });

    group.finish();
}

criterion_group!(benches, bench_memory_lock_acquisition);
criterion_main!(benches);

use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use shardflake::{Config, Id, Layout, MemoryStore, Shardflake};
use std::time::Instant;
use tokio::runtime::Builder;

// Number of IDs handled per benchmark iteration.
const TOTAL_IDS: usize = 4096;

fn config() -> Config {
    Config::new(1_646_160_000_000, Layout::new(41, 3, 9, 11).unwrap()).unwrap()
}

fn bench_encode(c: &mut Criterion) {
    let config = config();
    let mut group = c.benchmark_group("codec/encode");
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    group.bench_function(format!("elems/{TOTAL_IDS}"), |b| {
        b.iter(|| {
            for sequence in 0..TOTAL_IDS as u64 {
                black_box(config.encode(
                    black_box(48_403_200_000),
                    black_box(1),
                    black_box(7),
                    sequence & 2047,
                ));
            }
        });
    });
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let config = config();
    let ids: Vec<Id> = (0..TOTAL_IDS as u64)
        .map(|sequence| config.encode(48_403_200_000, 1, 7, sequence & 2047))
        .collect();
    let mut group = c.benchmark_group("codec/decode");
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    group.bench_function(format!("elems/{TOTAL_IDS}"), |b| {
        b.iter(|| {
            for id in &ids {
                black_box(config.decode(black_box(*id)));
            }
        });
    });
    group.finish();
}

fn bench_memory_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate/memory");
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    group.bench_function(format!("elems/{TOTAL_IDS}"), |b| {
        let rt = Builder::new_multi_thread()
            .enable_all()
            .worker_threads(1)
            .build()
            .unwrap();

        b.to_async(&rt).iter_custom(|iters| async move {
            let ids = Shardflake::new(config(), MemoryStore::new(config()));
            let start = Instant::now();
            for _ in 0..iters {
                let mut generated = 0;
                while generated < TOTAL_IDS {
                    let batch = ids
                        .generate_ids(0, (TOTAL_IDS - generated) as u64, None)
                        .await
                        .unwrap();
                    generated += batch.len();
                    black_box(batch);
                }
            }
            start.elapsed()
        });
    });
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_memory_store);
criterion_main!(benches);

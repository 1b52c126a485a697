mod common;

use std::sync::Arc;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use raingo_core::{MemoryStore, NoopObserver, PipelineSettings, Stores, pipeline};

use common::generate_wordlist;

fn make_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread().worker_threads(4).enable_all().build().unwrap()
}

fn fresh_stores() -> Stores {
    Stores::new(Arc::new(MemoryStore::new("local")), Arc::new(MemoryStore::new("authoritative")))
}

// Full run: hash, drain and dedup 10k plaintexts (10% repeats) into an empty local store.
fn bench_pipeline_workers(c: &mut Criterion) {
    let runtime = make_runtime();
    let words = generate_wordlist(10_000, 10);

    let mut group = c.benchmark_group("pipeline_10k");
    group.sample_size(20);

    for workers in [1, 4, 8] {
        let settings =
            PipelineSettings { workers, batch_size: 10_000, bulk_size: 1_000, results_capacity: 4_096 };

        group.bench_function(format!("workers_{workers}"), |b| {
            b.to_async(&runtime).iter_batched(
                || (fresh_stores(), words.clone()),
                |(stores, words)| async move {
                    pipeline::spawn(stores, settings, Arc::new(NoopObserver), words)
                        .wait()
                        .await
                        .unwrap()
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_pipeline_workers);
criterion_main!(benches);

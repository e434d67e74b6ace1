//! Benchmarks for the pipeline runtime.
//!
//! Benchmarks cover:
//! - Bounded queue push/pull and batch pulls
//! - Worker pool round trips
//! - End-to-end group throughput (submit, handle, route, drain)

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::sync::Arc;

use async_trait::async_trait;
use prometheus_pipeline::config::WorkerPoolConfig;
use prometheus_pipeline::core::{
    handler_fn, HandleConfig, HandleMode, HandlerOutput, OutputEndpoint, Params, PipelineError,
    Server, Task, WorkerPool,
};
use prometheus_pipeline::infra::BoundedQueue;
use prometheus_pipeline::runtime::TokioSpawner;
use serde_json::json;
use tokio::runtime::Runtime;
use tokio::sync::watch;

// ============================================================================
// Queue Benchmarks
// ============================================================================

fn bench_queue_push_pull(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_push_pull");

    for size in [100u64, 1_000, 10_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.to_async(Runtime::new().unwrap()).iter(|| async move {
                let q = BoundedQueue::new(size as usize);
                for i in 0..size {
                    q.push(i).await.unwrap();
                }
                for _ in 0..size {
                    black_box(q.pull().await);
                }
            });
        });
    }
    group.finish();
}

fn bench_queue_pull_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_pull_batch");

    for batch in [1usize, 16, 128] {
        group.throughput(Throughput::Elements(1_024));
        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, &batch| {
            b.to_async(Runtime::new().unwrap()).iter(|| async move {
                let q = BoundedQueue::new(1_024);
                for i in 0..1_024u32 {
                    q.push(i).await.unwrap();
                }
                for _ in 0..(1_024 / batch) {
                    black_box(q.pull_batch(batch).await);
                }
            });
        });
    }
    group.finish();
}

// ============================================================================
// Worker Pool Benchmarks
// ============================================================================

fn bench_pool_round_trip(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let pool = Arc::new(WorkerPool::new(WorkerPoolConfig::new().with_worker_count(4)).unwrap());

    c.bench_function("pool_round_trip", |b| {
        b.to_async(&rt).iter(|| {
            let pool = Arc::clone(&pool);
            async move { black_box(pool.run(|| async { 40 + 2 }).await.unwrap()) }
        });
    });
}

// ============================================================================
// End-to-End Scenarios
// ============================================================================

/// Sink that only counts deliveries.
struct CountingSink {
    count: watch::Sender<usize>,
}

#[async_trait]
impl OutputEndpoint for CountingSink {
    async fn consume(&self, tasks: Vec<(Params, Task)>) -> Result<(), PipelineError> {
        self.count.send_modify(|n| *n += tasks.len());
        Ok(())
    }
}

fn bench_group_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("group_throughput");
    let tasks = 1_000usize;
    group.throughput(Throughput::Elements(tasks as u64));

    for mode in [HandleMode::Cooperative, HandleMode::Thread] {
        let rt = Runtime::new().unwrap();
        let server = Server::new(TokioSpawner::new(rt.handle().clone()));
        let stage = server.add_group("bench", 4, Some(64)).unwrap();
        let sink = Arc::new(CountingSink {
            count: watch::channel(0).0,
        });
        stage.register_output_endpoint("out", sink.clone(), None, Some(64)).unwrap();
        stage
            .set_handle(
                handler_fn(|_ctx, batch: Vec<Task>| async move {
                    let out: Vec<HandlerOutput> = batch
                        .iter()
                        .map(|t| t.forward("out", t.payload.clone()).into())
                        .collect();
                    Ok::<_, anyhow::Error>(out)
                }),
                HandleConfig::new().with_batch_size(8).with_mode(mode),
            )
            .unwrap();

        group.bench_function(BenchmarkId::from_parameter(format!("{mode:?}")), |b| {
            b.to_async(&rt).iter(|| {
                let stage = Arc::clone(&stage);
                let sink = Arc::clone(&sink);
                async move {
                    let target = *sink.count.borrow() + tasks;
                    for i in 0..tasks {
                        stage.submit(Task::new("bench", "bench", json!(i))).await.unwrap();
                    }
                    let mut rx = sink.count.subscribe();
                    rx.wait_for(|n| *n >= target).await.unwrap();
                }
            });
        });
    }
    group.finish();
}

criterion_group!(queue_benches, bench_queue_push_pull, bench_queue_pull_batch);

criterion_group!(pool_benches, bench_pool_round_trip);

criterion_group!(scenario_benches, bench_group_throughput);

criterion_main!(queue_benches, pool_benches, scenario_benches);

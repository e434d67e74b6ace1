//! Tests for the tokio spawner and the API snapshots

use std::sync::Arc;

use prometheus_pipeline::core::{Server, SpawnExt};
use prometheus_pipeline::infra::{CollectSink, InMemoryJobStore};
use prometheus_pipeline::runtime::{health, list_groups, TokioSpawner};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn(async move {
        tx.send(123).unwrap();
    });

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
}

#[test]
fn test_owned_runtime_outlives_constructor() {
    let spawner = TokioSpawner::with_worker_threads(1).unwrap();
    let (tx, rx) = std::sync::mpsc::channel();
    spawner.spawn(async move {
        tx.send("ran").unwrap();
    });
    assert_eq!(rx.recv().unwrap(), "ran");
    assert_eq!(spawner.block_on(async { 7 }), 7);
}

#[test]
fn test_try_current_outside_runtime() {
    assert!(TokioSpawner::try_current().is_none());
}

#[tokio::test]
async fn test_list_groups_and_health() {
    let server = Server::builder(TokioSpawner::current())
        .job_store(Arc::new(InMemoryJobStore::new()))
        .build();
    let b = server.add_group("b", 2, Some(5)).unwrap();
    server.add_group("a", 1, None).unwrap();
    b.register_output_endpoint("out", Arc::new(CollectSink::new()), None, None)
        .unwrap();

    let groups = list_groups(&server);
    let names: Vec<_> = groups.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert_eq!(groups[1].queue_capacity, 5);
    assert_eq!(groups[1].outputs, vec!["out"]);
    assert!(groups[1].inputs.is_empty());

    let h = health(&server);
    assert!(h.ok);
    assert_eq!(h.groups, 2);
    assert_eq!(h.job_store_failures, Some(0));

    let json = serde_json::to_value(&groups[0]).unwrap();
    assert_eq!(json["concurrency"], 1);
}

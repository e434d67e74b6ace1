//! Tests for building groups from configuration

use prometheus_pipeline::builders::build_groups;
use prometheus_pipeline::config::ServerConfig;
use prometheus_pipeline::core::{PipelineError, Server};
use prometheus_pipeline::runtime::TokioSpawner;

#[tokio::test]
async fn test_build_groups_registers_every_group() {
    let cfg = ServerConfig::from_json_str(
        r#"{"groups": {"fetch": {"concurrency": 3}, "store": {"concurrency": 1, "queue_capacity": 9}}}"#,
    )
    .unwrap();
    let server = Server::new(TokioSpawner::current());

    let groups = build_groups(&server, &cfg).unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups["fetch"].concurrency(), 3);
    assert_eq!(groups["fetch"].queue_capacity(), 3);
    assert_eq!(groups["store"].queue_capacity(), 9);
    assert_eq!(server.group_names(), vec!["fetch", "store"]);
}

#[tokio::test]
async fn test_build_groups_rejects_invalid_config() {
    let server = Server::new(TokioSpawner::current());
    let err = build_groups(&server, &ServerConfig::default()).unwrap_err();
    assert!(matches!(err, PipelineError::InvalidConfig(_)));
    assert!(server.group_names().is_empty());
}

#[tokio::test]
async fn test_build_groups_reports_existing_group() {
    let cfg = ServerConfig::from_json_str(r#"{"groups": {"fetch": {"concurrency": 1}}}"#).unwrap();
    let server = Server::new(TokioSpawner::current());
    server.add_group("fetch", 1, None).unwrap();
    assert!(matches!(
        build_groups(&server, &cfg),
        Err(PipelineError::DuplicateGroup(_))
    ));
}

#[tokio::test]
async fn test_build_groups_registers_nothing_when_one_name_is_taken() {
    let cfg = ServerConfig::from_json_str(
        r#"{"groups": {"a": {"concurrency": 1}, "b": {"concurrency": 1}, "c": {"concurrency": 1}, "d": {"concurrency": 1}}}"#,
    )
    .unwrap();
    let server = Server::new(TokioSpawner::current());
    server.add_group("c", 1, None).unwrap();

    let err = build_groups(&server, &cfg).unwrap_err();
    assert!(matches!(err, PipelineError::DuplicateGroup(ref name) if name == "c"));
    assert_eq!(server.group_names(), vec!["c"]);
}

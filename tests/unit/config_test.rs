//! Tests for configuration validation

use std::collections::HashMap;

use prometheus_pipeline::config::{GroupConfig, ServerConfig, WorkerPoolConfig};
use prometheus_pipeline::core::HandleMode;

fn group(concurrency: usize) -> GroupConfig {
    GroupConfig {
        concurrency,
        queue_capacity: None,
        batch_size: 1,
        mode: HandleMode::Cooperative,
    }
}

#[test]
fn test_group_config_validation() {
    assert!(group(4).validate().is_ok());
    assert!(group(0).validate().is_err());

    let mut zero_queue = group(4);
    zero_queue.queue_capacity = Some(0);
    assert!(zero_queue.validate().is_err());

    let mut zero_batch = group(4);
    zero_batch.batch_size = 0;
    assert!(zero_batch.validate().is_err());
}

#[test]
fn test_server_config_names_the_bad_group() {
    let mut groups = HashMap::new();
    groups.insert("ok".to_string(), group(1));
    groups.insert("broken".to_string(), group(0));
    let err = ServerConfig { groups }.validate().unwrap_err();
    assert!(err.contains("group `broken` invalid"), "{err}");
}

#[test]
fn test_server_config_from_json() {
    let json = r#"{
        "groups": {
            "fetch": {"concurrency": 2, "queue_capacity": 10},
            "store": {"concurrency": 1, "batch_size": 50, "mode": "thread"}
        }
    }"#;
    let cfg = ServerConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.groups["fetch"].queue_capacity, Some(10));
    assert_eq!(cfg.groups["store"].batch_size, 50);
    assert_eq!(cfg.groups["store"].mode, HandleMode::Thread);
}

#[test]
fn test_server_config_rejects_unknown_mode() {
    let json = r#"{"groups": {"g": {"concurrency": 1, "mode": "fork"}}}"#;
    let err = ServerConfig::from_json_str(json).unwrap_err();
    assert!(err.starts_with("parse error"), "{err}");
}

#[test]
fn test_worker_pool_config_validation() {
    assert!(WorkerPoolConfig::new().with_worker_count(2).validate().is_ok());
    assert!(WorkerPoolConfig::new().with_worker_count(0).validate().is_err());
    assert!(WorkerPoolConfig::new().with_max_queue_depth(0).validate().is_err());
}

//! Tests for error types

use prometheus_pipeline::core::{PipelineError, PoolError};

#[test]
fn test_duplicate_group_error() {
    let err = PipelineError::DuplicateGroup("parse".to_string());
    assert_eq!(format!("{err}"), "group already registered: parse");
    assert!(err.is_config());
}

#[test]
fn test_duplicate_binding_error() {
    let err = PipelineError::DuplicateBinding {
        group: "parse".to_string(),
        binding: "in".to_string(),
    };
    assert_eq!(format!("{err}"), "binding `in` already registered in group `parse`");
}

#[test]
fn test_unroutable_is_not_a_config_error() {
    let err = PipelineError::Unroutable("nowhere".to_string());
    assert_eq!(format!("{err}"), "no output binding for destination `nowhere`");
    assert!(!err.is_config());
}

#[test]
fn test_pool_error_is_transparent() {
    let err: PipelineError = PoolError::PoolShutdown.into();
    assert_eq!(format!("{err}"), format!("{}", PoolError::PoolShutdown));
    assert!(!err.is_config());
}

#[test]
fn test_errors_convert_into_anyhow() {
    fn fails() -> anyhow::Result<()> {
        Err(PipelineError::Store("disk full".to_string()))?;
        Ok(())
    }
    let err = fails().unwrap_err();
    assert_eq!(err.to_string(), "store error: disk full");
    assert!(err.downcast_ref::<PipelineError>().is_some());
}

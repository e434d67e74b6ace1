//! Tests for the job store backends

use chrono::{NaiveDate, NaiveDateTime};
use prometheus_pipeline::core::{upsert_job, JobRecord, JobStore, UpsertOutcome};
use prometheus_pipeline::infra::{FileJobStore, InMemoryJobStore};

fn at(minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 2, 29)
        .unwrap()
        .and_hms_opt(23, minute, 0)
        .unwrap()
}

fn record(name: &str, uid: &str, minute: u32) -> JobRecord {
    JobRecord {
        uid: uid.to_string(),
        name: name.to_string(),
        next_run_time: Some(at(minute + 1)),
        started: at(0),
        recent: at(minute),
        config: None,
    }
}

#[test]
fn test_memory_store_keys_by_name_and_uid() {
    let store = InMemoryJobStore::new();
    upsert_job(&store, record("a", "1", 1)).unwrap();
    upsert_job(&store, record("a", "2", 1)).unwrap();
    upsert_job(&store, record("b", "1", 1)).unwrap();
    assert_eq!(upsert_job(&store, record("a", "1", 5)).unwrap(), UpsertOutcome::Updated);

    assert_eq!(store.len(), 3);
    assert_eq!(store.get("a", "1").unwrap().recent, at(5));
    let names: Vec<_> = store
        .records()
        .into_iter()
        .map(|r| format!("{}/{}", r.name, r.uid))
        .collect();
    assert_eq!(names, vec!["a/1", "a/2", "b/1"]);
}

#[test]
fn test_file_store_insert_then_update_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jobs").join("records.json");

    let store = FileJobStore::new(&path).unwrap();
    assert_eq!(upsert_job(&store, record("sync", "u1", 1)).unwrap(), UpsertOutcome::Inserted);
    assert_eq!(upsert_job(&store, record("sync", "u1", 2)).unwrap(), UpsertOutcome::Updated);
    assert!(path.exists());

    let reopened = FileJobStore::new(&path).unwrap();
    let records = reopened.records().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].recent, at(2));
    assert_eq!(records[0].next_run_time, Some(at(3)));
}

#[test]
fn test_file_store_rollback_leaves_file_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.json");
    let store = FileJobStore::new(&path).unwrap();
    upsert_job(&store, record("sync", "u1", 1)).unwrap();
    let before = std::fs::read_to_string(&path).unwrap();

    let mut tx = store.begin().unwrap();
    tx.update(record("sync", "u1", 9)).unwrap();
    assert_eq!(tx.find("sync", "u1").unwrap().unwrap().recent, at(9));
    tx.rollback();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    assert!(tx_insert_duplicate_fails(&store));
}

fn tx_insert_duplicate_fails(store: &FileJobStore) -> bool {
    let mut tx = store.begin().unwrap();
    let failed = tx.insert(record("sync", "u1", 3)).is_err();
    tx.rollback();
    failed
}

#[test]
fn test_file_store_reports_corrupt_document() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.json");
    std::fs::write(&path, "not json").unwrap();
    let store = FileJobStore::new(&path).unwrap();
    assert!(upsert_job(&store, record("sync", "u1", 1)).is_err());
    assert!(store.records().is_err());
}

//! Job bookkeeping: best-effort persistence of job execution metadata.
//!
//! When a job descriptor accompanies a background job, a routine job or a
//! group handler, [`JobHook::record`] upserts a [`JobRecord`] keyed by
//! `(name, uid)` before the job body runs. Failures are rolled back and
//! logged; they never fail or delay the job beyond the upsert itself.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::core::PipelineError;
use crate::util::clock::Clock;

/// Identifies a job for bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    /// Unique id of this job instance.
    pub uid: String,
    /// Job name.
    pub name: String,
    /// Opaque job configuration stored alongside the record.
    pub job_config: Option<String>,
}

impl JobDescriptor {
    /// Descriptor with a random v4 UUID.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_uid(name, uuid::Uuid::new_v4().to_string())
    }

    /// Descriptor with an explicit uid.
    pub fn with_uid(name: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
            job_config: None,
        }
    }

    /// Attach the job configuration text.
    #[must_use]
    pub fn with_config(mut self, config: impl Into<String>) -> Self {
        self.job_config = Some(config.into());
        self
    }
}

/// Persisted execution metadata, one row per `(name, uid)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Job instance id.
    pub uid: String,
    /// Job name.
    pub name: String,
    /// Next scheduled run, for routine jobs.
    pub next_run_time: Option<NaiveDateTime>,
    /// When the owning worker was launched.
    pub started: NaiveDateTime,
    /// When the job last ran.
    pub recent: NaiveDateTime,
    /// Job configuration text.
    pub config: Option<String>,
}

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No row existed; one was inserted.
    Inserted,
    /// The existing row was overwritten.
    Updated,
}

/// Storage backend for job records.
pub trait JobStore: Send + Sync + 'static {
    /// Open a transaction.
    fn begin(&self) -> Result<Box<dyn JobTransaction + '_>, PipelineError>;
}

/// A unit of work against a [`JobStore`]. Nothing is visible until `commit`.
pub trait JobTransaction {
    /// Look up the row for `(name, uid)`.
    fn find(&mut self, name: &str, uid: &str) -> Result<Option<JobRecord>, PipelineError>;
    /// Insert a new row.
    fn insert(&mut self, record: JobRecord) -> Result<(), PipelineError>;
    /// Overwrite the existing row with the same `(name, uid)`.
    fn update(&mut self, record: JobRecord) -> Result<(), PipelineError>;
    /// Make the changes visible. A failed commit leaves the store unchanged.
    fn commit(self: Box<Self>) -> Result<(), PipelineError>;
    /// Discard the changes.
    fn rollback(self: Box<Self>);
}

/// Insert or update `record` in one transaction, rolling back on failure.
///
/// # Errors
///
/// Returns the store's error; the transaction has been rolled back.
pub fn upsert_job(store: &dyn JobStore, record: JobRecord) -> Result<UpsertOutcome, PipelineError> {
    let mut tx = store.begin()?;
    let staged = tx.find(&record.name, &record.uid).and_then(|existing| {
        if existing.is_some() {
            tx.update(record).map(|()| UpsertOutcome::Updated)
        } else {
            tx.insert(record).map(|()| UpsertOutcome::Inserted)
        }
    });
    match staged {
        Ok(outcome) => {
            tx.commit()?;
            Ok(outcome)
        }
        Err(e) => {
            tx.rollback();
            Err(e)
        }
    }
}

/// Hook counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobHookStats {
    /// Successful upserts.
    pub upserts: u64,
    /// Failed upserts.
    pub failures: u64,
}

/// Best-effort job bookkeeping shared by a server's workers.
///
/// Counters are atomics: they are bumped from the blocking pool that runs the
/// upsert and read from the scheduler.
pub struct JobHook {
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
    upserts: AtomicU64,
    failures: AtomicU64,
}

impl JobHook {
    /// Create a hook writing to `store`, stamping times from `clock`.
    pub fn new(store: Arc<dyn JobStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            upserts: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Current time according to the hook's clock.
    #[must_use]
    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    /// Upsert the record for `job`. Returns whether the write succeeded.
    ///
    /// `recent` is stamped now; `started` is the owning worker's launch time.
    /// The upsert runs on tokio's blocking pool.
    pub async fn record(
        &self,
        job: &JobDescriptor,
        started: NaiveDateTime,
        next_run_time: Option<NaiveDateTime>,
    ) -> bool {
        let record = JobRecord {
            uid: job.uid.clone(),
            name: job.name.clone(),
            next_run_time,
            started,
            recent: self.clock.now(),
            config: job.job_config.clone(),
        };
        let store = Arc::clone(&self.store);
        let result = tokio::task::spawn_blocking(move || upsert_job(store.as_ref(), record)).await;
        match result {
            Ok(Ok(outcome)) => {
                self.upserts.fetch_add(1, Ordering::Relaxed);
                debug!(job = %job.name, uid = %job.uid, ?outcome, "job record upserted");
                true
            }
            Ok(Err(e)) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                error!(job = %job.name, uid = %job.uid, error = %e, "job record upsert rolled back");
                false
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                error!(job = %job.name, uid = %job.uid, error = %e, "job record upsert aborted");
                false
            }
        }
    }

    /// Snapshot of the hook counters.
    #[must_use]
    pub fn stats(&self) -> JobHookStats {
        JobHookStats {
            upserts: self.upserts.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::clock::SystemClock;
    use parking_lot::Mutex;

    /// Store whose transactions fail on insert and record rollbacks.
    #[derive(Default)]
    struct BrokenStore {
        rollbacks: Mutex<u32>,
    }

    struct BrokenTx<'a> {
        store: &'a BrokenStore,
    }

    impl JobStore for BrokenStore {
        fn begin(&self) -> Result<Box<dyn JobTransaction + '_>, PipelineError> {
            Ok(Box::new(BrokenTx { store: self }))
        }
    }

    impl JobTransaction for BrokenTx<'_> {
        fn find(&mut self, _: &str, _: &str) -> Result<Option<JobRecord>, PipelineError> {
            Ok(None)
        }
        fn insert(&mut self, _: JobRecord) -> Result<(), PipelineError> {
            Err(PipelineError::Store("disk full".into()))
        }
        fn update(&mut self, _: JobRecord) -> Result<(), PipelineError> {
            unreachable!("find never returns a row")
        }
        fn commit(self: Box<Self>) -> Result<(), PipelineError> {
            unreachable!("insert always fails")
        }
        fn rollback(self: Box<Self>) {
            *self.store.rollbacks.lock() += 1;
        }
    }

    fn record() -> JobRecord {
        let now = SystemClock.now();
        JobRecord {
            uid: "u1".into(),
            name: "nightly".into(),
            next_run_time: None,
            started: now,
            recent: now,
            config: None,
        }
    }

    #[test]
    fn test_failed_upsert_rolls_back() {
        let store = BrokenStore::default();
        let err = upsert_job(&store, record()).unwrap_err();
        assert!(matches!(err, PipelineError::Store(ref msg) if msg == "disk full"));
        assert_eq!(*store.rollbacks.lock(), 1);
    }

    #[tokio::test]
    async fn test_hook_swallows_store_errors() {
        let hook = JobHook::new(Arc::new(BrokenStore::default()), Arc::new(SystemClock));
        let job = JobDescriptor::new("nightly");
        assert!(!hook.record(&job, hook.now(), None).await);
        assert_eq!(hook.stats(), JobHookStats { upserts: 0, failures: 1 });
    }

    #[test]
    fn test_descriptor_uids_are_unique() {
        let a = JobDescriptor::new("job");
        let b = JobDescriptor::new("job");
        assert_ne!(a.uid, b.uid);
        assert_eq!(a.name, "job");
    }
}

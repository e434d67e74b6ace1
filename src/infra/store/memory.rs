//! In-memory job store for development/testing.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::core::{JobRecord, JobStore, JobTransaction, PipelineError};

type Key = (String, String);

fn key(name: &str, uid: &str) -> Key {
    (name.to_string(), uid.to_string())
}

/// Job records held in a map; transactions stage writes and apply them on commit.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    rows: Mutex<HashMap<Key, JobRecord>>,
}

impl InMemoryJobStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed row for `(name, uid)`.
    #[must_use]
    pub fn get(&self, name: &str, uid: &str) -> Option<JobRecord> {
        self.rows.lock().get(&key(name, uid)).cloned()
    }

    /// All committed rows, sorted by name then uid.
    #[must_use]
    pub fn records(&self) -> Vec<JobRecord> {
        let mut records: Vec<_> = self.rows.lock().values().cloned().collect();
        records.sort_by(|a, b| (&a.name, &a.uid).cmp(&(&b.name, &b.uid)));
        records
    }

    /// Number of committed rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    /// Whether no row has been committed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct MemoryTx<'a> {
    store: &'a InMemoryJobStore,
    staged: HashMap<Key, JobRecord>,
}

impl MemoryTx<'_> {
    fn exists(&self, k: &Key) -> bool {
        self.staged.contains_key(k) || self.store.rows.lock().contains_key(k)
    }
}

impl JobStore for InMemoryJobStore {
    fn begin(&self) -> Result<Box<dyn JobTransaction + '_>, PipelineError> {
        Ok(Box::new(MemoryTx {
            store: self,
            staged: HashMap::new(),
        }))
    }
}

impl JobTransaction for MemoryTx<'_> {
    fn find(&mut self, name: &str, uid: &str) -> Result<Option<JobRecord>, PipelineError> {
        let k = key(name, uid);
        if let Some(staged) = self.staged.get(&k) {
            return Ok(Some(staged.clone()));
        }
        Ok(self.store.rows.lock().get(&k).cloned())
    }

    fn insert(&mut self, record: JobRecord) -> Result<(), PipelineError> {
        let k = key(&record.name, &record.uid);
        if self.exists(&k) {
            return Err(PipelineError::Store(format!(
                "job `{}` ({}) already exists",
                record.name, record.uid
            )));
        }
        self.staged.insert(k, record);
        Ok(())
    }

    fn update(&mut self, record: JobRecord) -> Result<(), PipelineError> {
        let k = key(&record.name, &record.uid);
        if !self.exists(&k) {
            return Err(PipelineError::Store(format!(
                "job `{}` ({}) not found",
                record.name, record.uid
            )));
        }
        self.staged.insert(k, record);
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), PipelineError> {
        self.store.rows.lock().extend(self.staged);
        Ok(())
    }

    fn rollback(self: Box<Self>) {}
}

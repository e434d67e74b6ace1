//! File-backed job store: one JSON document, replaced atomically on commit.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, MutexGuard};

use crate::core::{JobRecord, JobStore, JobTransaction, PipelineError};

type Rows = BTreeMap<(String, String), JobRecord>;

fn store_err(path: &Path, e: impl std::fmt::Display) -> PipelineError {
    PipelineError::Store(format!("{}: {e}", path.display()))
}

/// Job records persisted as a JSON array.
///
/// A transaction holds the store lock from `begin` until commit or rollback,
/// so transactions are serialised. Commit writes a sibling temp file and
/// renames it over the target.
#[derive(Debug)]
pub struct FileJobStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileJobStore {
    /// Open (or lazily create) the store at `path`. Parent directories are created.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Store` if the parent directory cannot be created.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| store_err(parent, e))?;
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    /// Location of the JSON document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All committed rows, sorted by name then uid.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Store` if the document cannot be read or parsed.
    pub fn records(&self) -> Result<Vec<JobRecord>, PipelineError> {
        let _guard = self.lock.lock();
        Ok(self.load()?.into_values().collect())
    }

    fn load(&self) -> Result<Rows, PipelineError> {
        if !self.path.exists() {
            return Ok(Rows::new());
        }
        let text = fs::read_to_string(&self.path).map_err(|e| store_err(&self.path, e))?;
        let records: Vec<JobRecord> =
            serde_json::from_str(&text).map_err(|e| store_err(&self.path, e))?;
        Ok(records
            .into_iter()
            .map(|r| ((r.name.clone(), r.uid.clone()), r))
            .collect())
    }

    fn save(&self, rows: &Rows) -> Result<(), PipelineError> {
        let records: Vec<&JobRecord> = rows.values().collect();
        let text = serde_json::to_string_pretty(&records).map_err(|e| store_err(&self.path, e))?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, text).map_err(|e| store_err(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| store_err(&self.path, e))
    }
}

struct FileTx<'a> {
    store: &'a FileJobStore,
    _guard: MutexGuard<'a, ()>,
    rows: Rows,
    dirty: bool,
}

impl JobStore for FileJobStore {
    fn begin(&self) -> Result<Box<dyn JobTransaction + '_>, PipelineError> {
        let guard = self.lock.lock();
        let rows = self.load()?;
        Ok(Box::new(FileTx {
            store: self,
            _guard: guard,
            rows,
            dirty: false,
        }))
    }
}

impl JobTransaction for FileTx<'_> {
    fn find(&mut self, name: &str, uid: &str) -> Result<Option<JobRecord>, PipelineError> {
        Ok(self.rows.get(&(name.to_string(), uid.to_string())).cloned())
    }

    fn insert(&mut self, record: JobRecord) -> Result<(), PipelineError> {
        let key = (record.name.clone(), record.uid.clone());
        if self.rows.contains_key(&key) {
            return Err(PipelineError::Store(format!(
                "job `{}` ({}) already exists",
                record.name, record.uid
            )));
        }
        self.rows.insert(key, record);
        self.dirty = true;
        Ok(())
    }

    fn update(&mut self, record: JobRecord) -> Result<(), PipelineError> {
        let key = (record.name.clone(), record.uid.clone());
        let Some(row) = self.rows.get_mut(&key) else {
            return Err(PipelineError::Store(format!(
                "job `{}` ({}) not found",
                record.name, record.uid
            )));
        };
        *row = record;
        self.dirty = true;
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), PipelineError> {
        if self.dirty {
            self.store.save(&self.rows)?;
        }
        Ok(())
    }

    fn rollback(self: Box<Self>) {}
}

//! Tokio runtime spawner implementation.

use std::future::Future;
use std::sync::Arc;

use tokio::runtime::{Handle, Runtime};

use crate::core::{BoxedLoop, Spawn};

/// Tokio-based spawner that runs pipeline loops on a tokio runtime.
///
/// Either borrows an existing runtime through its handle or owns one built by
/// [`with_worker_threads`](Self::with_worker_threads). An owned runtime shuts
/// down when the last clone is dropped; drop it outside async context.
#[derive(Clone)]
pub struct TokioSpawner {
    handle: Handle,
    runtime: Option<Arc<Runtime>>,
}

impl std::fmt::Debug for TokioSpawner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokioSpawner")
            .field("owns_runtime", &self.runtime.is_some())
            .finish()
    }
}

impl TokioSpawner {
    /// Create a spawner from a tokio runtime handle.
    #[must_use]
    pub const fn new(handle: Handle) -> Self {
        Self {
            handle,
            runtime: None,
        }
    }

    /// Spawner for the runtime the caller is running on.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    #[must_use]
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Spawner for the current runtime, if there is one.
    #[must_use]
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }

    /// Create a spawner owning a new multi-threaded runtime.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the runtime cannot be built.
    pub fn with_worker_threads(worker_threads: usize) -> Result<Self, std::io::Error> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .thread_name("pl-scheduler")
            .enable_all()
            .build()?;
        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(Arc::new(runtime)),
        })
    }

    /// Create a spawner owning a runtime with one worker thread per CPU.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the runtime cannot be built.
    pub fn with_default_threads() -> Result<Self, std::io::Error> {
        Self::with_worker_threads(num_cpus::get())
    }

    /// Handle of the underlying runtime.
    #[must_use]
    pub const fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Drive `fut` to completion on the underlying runtime.
    ///
    /// # Panics
    ///
    /// Panics when called from inside an async context.
    pub fn block_on<F: Future>(&self, fut: F) -> F::Output {
        match &self.runtime {
            Some(runtime) => runtime.block_on(fut),
            None => self.handle.block_on(fut),
        }
    }
}

impl Spawn for TokioSpawner {
    fn spawn_boxed(&self, fut: BoxedLoop) {
        self.handle.spawn(fut);
    }
}

//! Worker pool configuration.

use serde::{Deserialize, Serialize};

/// Default stack size for worker threads (2 MiB).
pub const DEFAULT_STACK_SIZE: usize = 2 * 1024 * 1024;

/// Configuration for a [`WorkerPool`](crate::core::WorkerPool).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerPoolConfig {
    /// Number of dedicated OS threads.
    pub worker_count: usize,
    /// Jobs admitted but not yet finished before `run` waits for room.
    pub max_queue_depth: usize,
    /// Stack size for each worker thread.
    pub thread_stack_size: usize,
    /// Worker thread name prefix; threads are named `{prefix}-{id}`.
    pub thread_name_prefix: String,
    /// Discard and rebuild a worker's runtime after a job panics.
    pub recycle_on_panic: bool,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get(),
            max_queue_depth: 64,
            thread_stack_size: DEFAULT_STACK_SIZE,
            thread_name_prefix: "pl-worker".into(),
            recycle_on_panic: false,
        }
    }
}

impl WorkerPoolConfig {
    /// Start from defaults (one worker per CPU).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of worker threads.
    #[must_use]
    pub const fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the admission depth.
    #[must_use]
    pub const fn with_max_queue_depth(mut self, depth: usize) -> Self {
        self.max_queue_depth = depth;
        self
    }

    /// Set the worker thread stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, size: usize) -> Self {
        self.thread_stack_size = size;
        self
    }

    /// Set the worker thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Rebuild a worker's runtime after a panicking job.
    #[must_use]
    pub const fn with_recycle_on_panic(mut self, recycle: bool) -> Self {
        self.recycle_on_panic = recycle;
        self
    }

    /// Validate pool configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".into());
        }
        if self.max_queue_depth == 0 {
            return Err("max_queue_depth must be greater than 0".into());
        }
        if self.thread_stack_size < 64 * 1024 {
            return Err("thread_stack_size must be at least 64 KiB".into());
        }
        Ok(())
    }
}

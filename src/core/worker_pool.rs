//! Worker pool with dedicated OS threads for blocking and CPU-bound work.
//!
//! Handlers registered in `thread` or `process` mode, and blocking endpoints,
//! run here instead of on the scheduler. Each worker thread owns a
//! current-thread tokio runtime, so a job may be async and still block freely
//! without stalling the scheduler.
//!
//! # Example
//!
//! ```rust,ignore
//! use prometheus_pipeline::config::WorkerPoolConfig;
//! use prometheus_pipeline::core::WorkerPool;
//!
//! let pool = WorkerPool::new(WorkerPoolConfig::new().with_worker_count(4))?;
//! let sum = pool.run(|| async { (1..=10).sum::<u32>() }).await?;
//! assert_eq!(sum, 55);
//! ```

mod native;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

pub use native::WorkerPool;

/// Errors that can occur when using a `WorkerPool`.
#[derive(Debug)]
pub enum PoolError {
    /// The pool has been shut down.
    PoolShutdown,

    /// Configuration validation failed.
    InvalidConfig(String),

    /// The job panicked on its worker thread.
    Panicked(String),

    /// Internal error (thread spawn failure, result channel dropped, etc.).
    Internal(String),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PoolShutdown => write!(f, "pool has been shut down"),
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            Self::Panicked(msg) => write!(f, "job panicked: {msg}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for PoolError {}

/// Statistics about pool utilization.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Number of worker threads.
    pub worker_count: usize,

    /// Currently executing jobs.
    pub active_jobs: u64,

    /// Total jobs submitted.
    pub submitted_jobs: u64,

    /// Total jobs that returned normally.
    pub completed_jobs: u64,

    /// Total jobs that panicked.
    pub failed_jobs: u64,

    /// Worker runtimes rebuilt after a panic.
    pub recycled_runtimes: u64,
}

/// Internal counters for pool statistics (thread-safe).
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub active_jobs: AtomicU64,
    pub submitted_jobs: AtomicU64,
    pub completed_jobs: AtomicU64,
    pub failed_jobs: AtomicU64,
    pub recycled_runtimes: AtomicU64,
}

impl PoolCounters {
    /// Get a snapshot of current statistics.
    pub fn snapshot(&self, worker_count: usize) -> PoolStats {
        PoolStats {
            worker_count,
            active_jobs: self.active_jobs.load(Ordering::Relaxed),
            submitted_jobs: self.submitted_jobs.load(Ordering::Relaxed),
            completed_jobs: self.completed_jobs.load(Ordering::Relaxed),
            failed_jobs: self.failed_jobs.load(Ordering::Relaxed),
            recycled_runtimes: self.recycled_runtimes.load(Ordering::Relaxed),
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_error_display() {
        let err = PoolError::PoolShutdown;
        assert_eq!(format!("{err}"), "pool has been shut down");

        let err = PoolError::Panicked("boom".into());
        assert_eq!(format!("{err}"), "job panicked: boom");
    }

    #[test]
    fn test_pool_counters_snapshot() {
        let counters = PoolCounters::default();
        counters.submitted_jobs.fetch_add(10, Ordering::Relaxed);
        counters.completed_jobs.fetch_add(7, Ordering::Relaxed);
        counters.failed_jobs.fetch_add(2, Ordering::Relaxed);

        let stats = counters.snapshot(4);
        assert_eq!(stats.worker_count, 4);
        assert_eq!(stats.submitted_jobs, 10);
        assert_eq!(stats.completed_jobs, 7);
        assert_eq!(stats.failed_jobs, 2);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("static text");
        assert_eq!(panic_message(payload.as_ref()), "static text");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn std::any::Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}

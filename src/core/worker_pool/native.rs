//! Native implementation of `WorkerPool` using OS threads.
//!
//! This implementation spawns dedicated OS threads that each have their own
//! single-threaded tokio runtime. Blocking handlers and blocking endpoints run
//! here so they never stall the scheduler.
//!
//! # Design Principles
//!
//! - **No polling**: Workers block on channel recv; results come back on a oneshot
//! - **Admission by semaphore**: `run` waits for room instead of failing when busy
//! - **Clean shutdown**: Dropping the sender unblocks workers naturally

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tokio::runtime::Runtime;
use tokio::sync::{oneshot, Semaphore};
use tracing::{debug, error, info, warn};

use crate::config::WorkerPoolConfig;

use super::{panic_message, PoolCounters, PoolError, PoolStats};

/// A job shipped to a worker. Returns `true` when the job panicked.
type PoolJob = Box<dyn FnOnce(&Runtime) -> bool + Send>;

/// Worker pool with dedicated OS threads for blocking work.
///
/// # Design
///
/// - **No polling**: Workers block on channel recv
/// - **Clean shutdown**: Dropping sender naturally unblocks all workers
/// - **Lock-free fast path**: Atomic counters, brief mutex around the sender
pub struct WorkerPool {
    /// Pool configuration.
    config: WorkerPoolConfig,

    /// Job sender (to workers). Option allows clean shutdown by dropping.
    job_tx: Mutex<Option<Sender<PoolJob>>>,

    /// One permit per admitted, unfinished job.
    permits: Arc<Semaphore>,

    /// Pool statistics counters (lock-free atomics).
    counters: Arc<PoolCounters>,

    /// Shutdown flag (lock-free atomic).
    shutdown: AtomicBool,

    /// Worker thread handles.
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Create a new worker pool with the given configuration.
    ///
    /// This spawns `config.worker_count` OS threads, each with its own
    /// single-threaded tokio runtime for executing jobs.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidConfig` if the configuration is invalid and
    /// `PoolError::Internal` if a worker thread cannot be spawned.
    pub fn new(config: WorkerPoolConfig) -> Result<Self, PoolError> {
        config.validate().map_err(PoolError::InvalidConfig)?;

        let (job_tx, job_rx) = bounded::<PoolJob>(config.max_queue_depth);
        let counters = Arc::new(PoolCounters::default());

        let mut workers = Vec::with_capacity(config.worker_count);
        for worker_id in 0..config.worker_count {
            let worker = spawn_worker(
                worker_id,
                &config,
                job_rx.clone(),
                Arc::clone(&counters),
            )?;
            workers.push(worker);
        }

        info!(
            prefix = %config.thread_name_prefix,
            worker_count = config.worker_count,
            max_queue_depth = config.max_queue_depth,
            recycle_on_panic = config.recycle_on_panic,
            "WorkerPool initialized with dedicated OS threads"
        );

        Ok(Self {
            permits: Arc::new(Semaphore::new(config.max_queue_depth)),
            config,
            job_tx: Mutex::new(Some(job_tx)),
            counters,
            shutdown: AtomicBool::new(false),
            workers: Mutex::new(workers),
        })
    }

    /// Run a job on a worker thread and wait for its result.
    ///
    /// Waits for admission when `max_queue_depth` jobs are already in flight.
    /// The future returned by `job` is driven by the worker's own runtime, so
    /// it does not need to be `Send`.
    ///
    /// # Errors
    ///
    /// - `PoolError::PoolShutdown` if the pool has been shut down
    /// - `PoolError::Panicked` if the job panicked
    /// - `PoolError::Internal` if the worker went away without answering
    pub async fn run<F, Fut, R>(&self, job: F) -> Result<R, PoolError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = R> + 'static,
        R: Send + 'static,
    {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(PoolError::PoolShutdown);
        }

        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::PoolShutdown)?;

        let (result_tx, result_rx) = oneshot::channel();
        let counters = Arc::clone(&self.counters);
        let pool_job: PoolJob = Box::new(move |rt: &Runtime| {
            let _permit = permit;
            counters.active_jobs.fetch_add(1, Ordering::Relaxed);
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| rt.block_on(job())));
            counters.active_jobs.fetch_sub(1, Ordering::Relaxed);
            match outcome {
                Ok(value) => {
                    counters.completed_jobs.fetch_add(1, Ordering::Relaxed);
                    let _ = result_tx.send(Ok(value));
                    false
                }
                Err(payload) => {
                    counters.failed_jobs.fetch_add(1, Ordering::Relaxed);
                    let _ = result_tx.send(Err(PoolError::Panicked(panic_message(
                        payload.as_ref(),
                    ))));
                    true
                }
            }
        });

        {
            let job_tx_guard = self.job_tx.lock();
            let Some(job_tx) = job_tx_guard.as_ref() else {
                return Err(PoolError::PoolShutdown);
            };
            match job_tx.try_send(pool_job) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    return Err(PoolError::Internal(
                        "job channel full despite admission permit".into(),
                    ));
                }
                Err(TrySendError::Disconnected(_)) => return Err(PoolError::PoolShutdown),
            }
        }
        self.counters.submitted_jobs.fetch_add(1, Ordering::Relaxed);

        match result_rx.await {
            Ok(result) => result,
            Err(_) => Err(PoolError::Internal("worker dropped the job result".into())),
        }
    }

    /// Get current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot(self.config.worker_count)
    }

    /// Number of worker threads.
    #[must_use]
    pub const fn worker_count(&self) -> usize {
        self.config.worker_count
    }

    /// Shut down the pool and join idle workers.
    ///
    /// Jobs already running finish first; callers waiting for admission get
    /// `PoolError::PoolShutdown`.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }

        info!(prefix = %self.config.thread_name_prefix, "Shutting down worker pool");
        self.permits.close();
        self.job_tx.lock().take();

        let mut workers = self.workers.lock();
        for (idx, worker) in workers.drain(..).enumerate() {
            if worker.join().is_err() {
                warn!(worker_id = idx, "Worker thread panicked outside a job");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Signal shutdown but don't join: a job may still be running.
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            self.permits.close();
            self.job_tx.lock().take();
            debug!(
                prefix = %self.config.thread_name_prefix,
                "WorkerPool dropped without explicit shutdown - workers will be detached"
            );
        }
    }
}

fn build_runtime(worker_id: usize) -> Option<Runtime> {
    match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => Some(rt),
        Err(e) => {
            error!(worker_id = worker_id, error = %e, "Failed to create worker runtime");
            None
        }
    }
}

/// Spawn a worker thread.
fn spawn_worker(
    worker_id: usize,
    config: &WorkerPoolConfig,
    job_rx: Receiver<PoolJob>,
    counters: Arc<PoolCounters>,
) -> Result<JoinHandle<()>, PoolError> {
    let recycle = config.recycle_on_panic;
    thread::Builder::new()
        .name(format!("{}-{worker_id}", config.thread_name_prefix))
        .stack_size(config.thread_stack_size)
        .spawn(move || {
            debug!(worker_id = worker_id, "Worker thread started");
            let Some(mut rt) = build_runtime(worker_id) else {
                return;
            };

            // When the sender is dropped (shutdown), recv returns Err.
            while let Ok(job) = job_rx.recv() {
                let panicked = job(&rt);
                if panicked && recycle {
                    let Some(fresh) = build_runtime(worker_id) else {
                        break;
                    };
                    rt = fresh;
                    counters.recycled_runtimes.fetch_add(1, Ordering::Relaxed);
                    warn!(worker_id = worker_id, "Worker runtime rebuilt after panicking job");
                }
            }

            debug!(worker_id = worker_id, "Worker thread exiting");
        })
        .map_err(|e| PoolError::Internal(format!("failed to spawn worker thread: {e}")))
}

//! Endpoint contracts: where tasks come from and where results go.
//!
//! Endpoints are owned by the caller and handed to a group as `Arc`s. Async
//! ("cooperative") endpoints implement [`InputEndpoint`] / [`OutputEndpoint`]
//! directly and run on the scheduler. Blocking endpoints implement the
//! `Blocking*` traits and are adapted with [`blocking_input`] /
//! [`blocking_output`], which give each one a dedicated worker thread.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::WorkerPoolConfig;
use crate::core::worker_pool::WorkerPool;
use crate::core::{Fetched, PipelineError, Task};

/// Per-binding parameters passed back to the output endpoint with each task.
pub type Params = Value;

/// A source of work items.
#[async_trait]
pub trait InputEndpoint: Send + Sync + 'static {
    /// Produce the next item for `point`, or `None` when nothing is available.
    async fn produce(&self, point: Option<&str>) -> Result<Option<Fetched>, PipelineError>;
}

/// A sink for result tasks.
#[async_trait]
pub trait OutputEndpoint: Send + Sync + 'static {
    /// Consume a batch of tasks, each paired with its binding's params.
    async fn consume(&self, tasks: Vec<(Params, Task)>) -> Result<(), PipelineError>;
}

/// A source whose `produce` blocks the calling thread.
pub trait BlockingInputEndpoint: Send + Sync + 'static {
    /// Produce the next item for `point`, or `None` when nothing is available.
    fn produce(&self, point: Option<&str>) -> Result<Option<Fetched>, PipelineError>;
}

/// A sink whose `consume` blocks the calling thread.
pub trait BlockingOutputEndpoint: Send + Sync + 'static {
    /// Consume a batch of tasks, each paired with its binding's params.
    fn consume(&self, tasks: Vec<(Params, Task)>) -> Result<(), PipelineError>;
}

fn endpoint_pool(name: &str) -> Result<WorkerPool, PipelineError> {
    let config = WorkerPoolConfig::new()
        .with_worker_count(1)
        .with_max_queue_depth(16)
        .with_thread_name_prefix(format!("pl-ep-{name}"));
    Ok(WorkerPool::new(config)?)
}

struct BlockingInput<E> {
    inner: Arc<E>,
    pool: WorkerPool,
}

#[async_trait]
impl<E: BlockingInputEndpoint> InputEndpoint for BlockingInput<E> {
    async fn produce(&self, point: Option<&str>) -> Result<Option<Fetched>, PipelineError> {
        let inner = Arc::clone(&self.inner);
        let point = point.map(str::to_string);
        self.pool
            .run(move || async move { inner.produce(point.as_deref()) })
            .await?
    }
}

struct BlockingOutput<E> {
    inner: Arc<E>,
    pool: WorkerPool,
}

#[async_trait]
impl<E: BlockingOutputEndpoint> OutputEndpoint for BlockingOutput<E> {
    async fn consume(&self, tasks: Vec<(Params, Task)>) -> Result<(), PipelineError> {
        let inner = Arc::clone(&self.inner);
        self.pool
            .run(move || async move { inner.consume(tasks) })
            .await?
    }
}

/// Adapt a blocking source onto its own worker thread.
///
/// # Errors
///
/// Returns `PipelineError::Pool` if the worker thread cannot be started.
pub fn blocking_input<E: BlockingInputEndpoint>(
    name: &str,
    endpoint: Arc<E>,
) -> Result<Arc<dyn InputEndpoint>, PipelineError> {
    Ok(Arc::new(BlockingInput {
        inner: endpoint,
        pool: endpoint_pool(name)?,
    }))
}

/// Adapt a blocking sink onto its own worker thread.
///
/// Keep the returned `Arc` and clone it for every binding that should share
/// a queue: queue sharing is keyed on this allocation.
///
/// # Errors
///
/// Returns `PipelineError::Pool` if the worker thread cannot be started.
pub fn blocking_output<E: BlockingOutputEndpoint>(
    name: &str,
    endpoint: Arc<E>,
) -> Result<Arc<dyn OutputEndpoint>, PipelineError> {
    Ok(Arc::new(BlockingOutput {
        inner: endpoint,
        pool: endpoint_pool(name)?,
    }))
}

/// Identity of an output endpoint: the address of its shared allocation.
pub(crate) fn endpoint_id(endpoint: &Arc<dyn OutputEndpoint>) -> usize {
    Arc::as_ptr(endpoint).cast::<()>().addr()
}

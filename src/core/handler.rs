//! Handler contract and per-group handler configuration.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{AppResult, Group, HandlerOutput, JobDescriptor, PipelineError, Task};

/// Where a group's handler invocations run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleMode {
    /// Awaited directly on the scheduler; the handler must not block.
    #[default]
    Cooperative,
    /// Submitted to a pool of `concurrency` dedicated OS threads.
    Thread,
    /// Like `Thread`, but a worker whose handler panicked discards its
    /// runtime and starts from a fresh one.
    ///
    /// No OS process is spawned. Handlers share the address space of the
    /// server, so memory corruption, `abort` or global state left behind by a
    /// handler is not contained.
    Process,
}

impl HandleMode {
    /// Whether invocations leave the scheduler.
    #[must_use]
    pub const fn uses_pool(self) -> bool {
        !matches!(self, Self::Cooperative)
    }
}

/// Handler configuration, validated once by `Group::set_handle`.
#[derive(Debug, Clone)]
pub struct HandleConfig {
    /// Tasks per handler invocation.
    pub batch_size: usize,
    /// Invocation mode.
    pub mode: HandleMode,
    /// Job descriptor; when present the job-store hook runs before each batch.
    pub job: Option<JobDescriptor>,
    /// Extra arguments handed to every invocation.
    pub params: Value,
}

impl Default for HandleConfig {
    fn default() -> Self {
        Self {
            batch_size: 1,
            mode: HandleMode::Cooperative,
            job: None,
            params: Value::Null,
        }
    }
}

impl HandleConfig {
    /// Single-task batches, cooperative mode.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the batch size.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the invocation mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: HandleMode) -> Self {
        self.mode = mode;
        self
    }

    /// Attach a job descriptor.
    #[must_use]
    pub fn with_job(mut self, job: JobDescriptor) -> Self {
        self.job = Some(job);
        self
    }

    /// Set the extra invocation arguments.
    #[must_use]
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::InvalidConfig` when `batch_size` is zero.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.batch_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "batch_size must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// What a handler invocation gets besides its batch.
#[derive(Clone)]
pub struct HandlerContext {
    /// The group running the handler.
    pub group: Arc<Group>,
    /// Index of the worker slot, `0..concurrency`.
    pub slot: usize,
    /// Job descriptor from the handler configuration.
    pub job: Option<JobDescriptor>,
    /// Extra arguments from the handler configuration.
    pub params: Value,
}

impl HandlerContext {
    /// Name of the group running the handler.
    #[must_use]
    pub fn group_name(&self) -> &str {
        self.group.name()
    }
}

/// Group handler: turns a batch of tasks into result tasks.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use prometheus_pipeline::core::{AppResult, HandlerContext, HandlerOutput, Task, TaskHandler};
///
/// struct Upper;
///
/// #[async_trait]
/// impl TaskHandler for Upper {
///     async fn handle(&self, _ctx: &HandlerContext, batch: Vec<Task>) -> AppResult<Vec<HandlerOutput>> {
///         Ok(batch
///             .into_iter()
///             .map(|t| Task::to("out", t.payload.to_string().to_uppercase().into()).into())
///             .collect())
///     }
/// }
/// ```
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    /// Process one batch. An error drops the batch; the slot carries on.
    async fn handle(&self, ctx: &HandlerContext, batch: Vec<Task>) -> AppResult<Vec<HandlerOutput>>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> TaskHandler for FnHandler<F>
where
    F: Fn(HandlerContext, Vec<Task>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<Vec<HandlerOutput>>> + Send + 'static,
{
    async fn handle(&self, ctx: &HandlerContext, batch: Vec<Task>) -> AppResult<Vec<HandlerOutput>> {
        (self.0)(ctx.clone(), batch).await
    }
}

/// Wrap an async closure as a [`TaskHandler`].
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn TaskHandler>
where
    F: Fn(HandlerContext, Vec<Task>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<Vec<HandlerOutput>>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

//! Pipeline stage: bindings, worker slots and the glue between them.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use chrono::NaiveDateTime;
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::config::WorkerPoolConfig;
use crate::core::feed::{fetch_loop, InputBinding};
use crate::core::routing::{drain_loop, route, OutputTable};
use crate::core::stats::GroupCounters;
use crate::core::worker_pool::{panic_message, WorkerPool};
use crate::core::{
    AppResult, Gate, GroupStats, HandleConfig, HandleMode, HandlerContext, HandlerOutput,
    InputEndpoint, JobHook, OutputEndpoint, Params, PipelineError, Spawn, SpawnExt, Task,
    TaskHandler,
};
use crate::infra::queue::BoundedQueue;

/// Input gates and output table of a group. Names are unique across both.
#[derive(Default)]
struct Bindings {
    inputs: HashMap<String, Arc<Gate>>,
    outputs: OutputTable,
}

impl Bindings {
    fn contains(&self, name: &str) -> bool {
        self.inputs.contains_key(name) || self.outputs.contains(name)
    }
}

/// A named pipeline stage.
///
/// Fetch loops feed the group's bounded input queue, `concurrency` worker
/// slots pull batches from it and run the handler, and result tasks are
/// routed by destination to the output bindings' drain loops.
///
/// Groups are created by [`Server::add_group`](crate::core::Server::add_group).
pub struct Group {
    name: String,
    concurrency: usize,
    input: BoundedQueue<Task>,
    bindings: Mutex<Bindings>,
    handler_set: AtomicBool,
    counters: Arc<GroupCounters>,
    spawner: Arc<dyn Spawn>,
    hook: Option<Arc<JobHook>>,
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("concurrency", &self.concurrency)
            .field("queue_capacity", &self.input.capacity())
            .finish_non_exhaustive()
    }
}

impl Group {
    pub(crate) fn new(
        name: String,
        concurrency: usize,
        queue_capacity: usize,
        spawner: Arc<dyn Spawn>,
        hook: Option<Arc<JobHook>>,
    ) -> Self {
        Self {
            name,
            concurrency,
            input: BoundedQueue::new(queue_capacity),
            bindings: Mutex::new(Bindings::default()),
            handler_set: AtomicBool::new(false),
            counters: Arc::new(GroupCounters::default()),
            spawner,
            hook,
        }
    }

    /// Group name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of worker slots.
    #[must_use]
    pub const fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Capacity of the input queue.
    #[must_use]
    pub fn queue_capacity(&self) -> usize {
        self.input.capacity()
    }

    /// Tasks waiting in the input queue.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.input.len()
    }

    /// Bind an input endpoint and start its fetch loop.
    ///
    /// `point` is passed to every `produce` call. `interval` is the pause after
    /// each admitted item; zero polls as fast as the queue accepts.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::DuplicateBinding` if `name` is already bound.
    pub fn register_input_endpoint(
        &self,
        name: &str,
        endpoint: Arc<dyn InputEndpoint>,
        point: Option<&str>,
        interval: Duration,
    ) -> Result<(), PipelineError> {
        let gate = {
            let mut bindings = self.bindings.lock();
            if bindings.contains(name) {
                return Err(self.duplicate(name));
            }
            let gate = Arc::new(Gate::new());
            bindings.inputs.insert(name.to_string(), Arc::clone(&gate));
            gate
        };

        let binding = InputBinding {
            name: name.to_string(),
            endpoint,
            point: point.map(str::to_string),
            interval,
            gate,
        };
        self.spawner.spawn(fetch_loop(
            self.name.clone(),
            binding,
            self.input.clone(),
            Arc::clone(&self.counters),
        ));
        Ok(())
    }

    /// Bind an output endpoint under `name`.
    ///
    /// Bindings with the same endpoint `Arc` and equal `params` share one
    /// queue and one drain loop; `buffer_size` (default: the group's
    /// concurrency) only applies when the pair is new.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::DuplicateBinding` if `name` is already bound, or
    /// `PipelineError::InvalidConfig` for a zero `buffer_size`.
    pub fn register_output_endpoint(
        &self,
        name: &str,
        endpoint: Arc<dyn OutputEndpoint>,
        params: Option<Params>,
        buffer_size: Option<usize>,
    ) -> Result<(), PipelineError> {
        let buffer_size = buffer_size.unwrap_or(self.concurrency);
        if buffer_size == 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "buffer_size for output `{name}` in group `{}` must be greater than 0",
                self.name
            )));
        }
        let params = params.unwrap_or(Value::Null);

        let created = {
            let mut bindings = self.bindings.lock();
            if bindings.contains(name) {
                return Err(self.duplicate(name));
            }
            bindings.outputs.bind(name, endpoint, params, buffer_size)
        };

        match created {
            Some(out) => {
                info!(group = %self.name, binding = %name, buffer_size, "output binding registered");
                self.spawner
                    .spawn(drain_loop(self.name.clone(), out, Arc::clone(&self.counters)));
            }
            None => {
                info!(group = %self.name, binding = %name, "output binding aliased to existing queue");
            }
        }
        Ok(())
    }

    /// Stop admissions from input binding `name`.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::UnknownBinding` if `name` is not an input binding.
    pub fn suspend_endpoint(&self, name: &str) -> Result<(), PipelineError> {
        self.gate(name)?.suspend();
        info!(group = %self.name, binding = %name, "input binding suspended");
        Ok(())
    }

    /// Resume admissions from input binding `name`.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::UnknownBinding` if `name` is not an input binding.
    pub fn resume_endpoint(&self, name: &str) -> Result<(), PipelineError> {
        self.gate(name)?.resume();
        info!(group = %self.name, binding = %name, "input binding resumed");
        Ok(())
    }

    /// Whether input binding `name` is suspended.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::UnknownBinding` if `name` is not an input binding.
    pub fn is_suspended(&self, name: &str) -> Result<bool, PipelineError> {
        Ok(!self.gate(name)?.is_open())
    }

    /// Admit a task directly, bypassing input bindings.
    ///
    /// Waits while the input queue is full.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::QueueClosed` if the queue is gone.
    pub async fn submit(&self, task: Task) -> Result<(), PipelineError> {
        self.input.push(task).await?;
        self.counters.admitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Install the handler and start `concurrency` worker slots.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::InvalidConfig` for a bad `config`,
    /// `PipelineError::HandlerAlreadySet` on a second call, or
    /// `PipelineError::Pool` if the thread pool cannot start.
    pub fn set_handle(
        self: &Arc<Self>,
        handler: Arc<dyn TaskHandler>,
        config: HandleConfig,
    ) -> Result<(), PipelineError> {
        config.validate()?;
        if self.handler_set.swap(true, Ordering::AcqRel) {
            return Err(PipelineError::HandlerAlreadySet(self.name.clone()));
        }

        let pool = if config.mode.uses_pool() {
            let pool_config = WorkerPoolConfig::new()
                .with_worker_count(self.concurrency)
                .with_max_queue_depth(self.concurrency)
                .with_thread_name_prefix(format!("pl-{}", self.name))
                .with_recycle_on_panic(config.mode == HandleMode::Process);
            match WorkerPool::new(pool_config) {
                Ok(pool) => Some(Arc::new(pool)),
                Err(e) => {
                    self.handler_set.store(false, Ordering::Release);
                    return Err(e.into());
                }
            }
        } else {
            None
        };

        let launched = self.hook.as_ref().map(|hook| hook.now());
        for slot in 0..self.concurrency {
            let ctx = HandlerContext {
                group: Arc::clone(self),
                slot,
                job: config.job.clone(),
                params: config.params.clone(),
            };
            self.spawner.spawn(Arc::clone(self).worker_slot(
                ctx,
                Arc::clone(&handler),
                config.batch_size,
                pool.clone(),
                launched,
            ));
        }
        info!(
            group = %self.name,
            concurrency = self.concurrency,
            batch_size = config.batch_size,
            mode = ?config.mode,
            "handler installed"
        );
        Ok(())
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> GroupStats {
        self.counters.snapshot(self.input.len())
    }

    /// Names of the input bindings, sorted.
    #[must_use]
    pub fn input_bindings(&self) -> Vec<String> {
        let mut names: Vec<_> = self.bindings.lock().inputs.keys().cloned().collect();
        names.sort();
        names
    }

    /// Names of the output bindings, sorted.
    #[must_use]
    pub fn output_bindings(&self) -> Vec<String> {
        self.bindings.lock().outputs.names()
    }

    /// Number of distinct output queues (and drain loops).
    #[must_use]
    pub fn output_queue_count(&self) -> usize {
        self.bindings.lock().outputs.queue_count()
    }

    fn gate(&self, name: &str) -> Result<Arc<Gate>, PipelineError> {
        self.bindings
            .lock()
            .inputs
            .get(name)
            .cloned()
            .ok_or_else(|| PipelineError::UnknownBinding {
                group: self.name.clone(),
                binding: name.to_string(),
            })
    }

    fn duplicate(&self, name: &str) -> PipelineError {
        PipelineError::DuplicateBinding {
            group: self.name.clone(),
            binding: name.to_string(),
        }
    }

    async fn worker_slot(
        self: Arc<Self>,
        ctx: HandlerContext,
        handler: Arc<dyn TaskHandler>,
        batch_size: usize,
        pool: Option<Arc<WorkerPool>>,
        launched: Option<NaiveDateTime>,
    ) {
        debug!(group = %self.name, slot = ctx.slot, "worker slot started");
        while let Some(batch) = self.input.pull_batch(batch_size).await {
            if let (Some(hook), Some(job), Some(launched)) = (&self.hook, &ctx.job, launched) {
                hook.record(job, launched, None).await;
            }

            self.counters.handler_started();
            let outcome = invoke(&handler, &ctx, batch, pool.as_deref()).await;
            self.counters.handler_finished(outcome.is_err());

            match outcome {
                Ok(outputs) => {
                    debug!(group = %self.name, slot = ctx.slot, outputs = outputs.len(), "batch handled");
                    let resolve = |destination: &str| self.bindings.lock().outputs.resolve(destination);
                    route(&self.name, resolve, outputs, &self.counters).await;
                }
                Err(e) => {
                    error!(
                        group = %self.name,
                        slot = ctx.slot,
                        batch_size,
                        error = format!("{e:#}"),
                        "handler failed; batch dropped"
                    );
                }
            }
        }
    }
}

async fn invoke(
    handler: &Arc<dyn TaskHandler>,
    ctx: &HandlerContext,
    batch: Vec<Task>,
    pool: Option<&WorkerPool>,
) -> AppResult<Vec<HandlerOutput>> {
    match pool {
        None => match AssertUnwindSafe(handler.handle(ctx, batch)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(anyhow!("handler panicked: {}", panic_message(panic.as_ref()))),
        },
        Some(pool) => {
            let handler = Arc::clone(handler);
            let ctx = ctx.clone();
            pool.run(move || async move { handler.handle(&ctx, batch).await })
                .await?
        }
    }
}

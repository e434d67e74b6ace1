//! Server: owner of the group registry and the background jobs.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use tracing::{error, info};

use crate::core::routine::Routine;
use crate::core::worker_pool::panic_message;
use crate::core::{
    AppResult, Group, GroupStats, JobDescriptor, JobHook, JobHookStats, JobStore, PipelineError,
    RoutineSpec, Spawn, SpawnExt,
};
use crate::runtime::TokioSpawner;
use crate::util::clock::{Clock, SystemClock};

/// Groups by name.
#[derive(Default)]
struct GroupRegistry {
    groups: Mutex<BTreeMap<String, Arc<Group>>>,
}

impl GroupRegistry {
    fn insert_with<F>(&self, name: &str, make: F) -> Result<Arc<Group>, PipelineError>
    where
        F: FnOnce() -> Group,
    {
        let mut groups = self.groups.lock();
        if groups.contains_key(name) {
            return Err(PipelineError::DuplicateGroup(name.to_string()));
        }
        let group = Arc::new(make());
        groups.insert(name.to_string(), Arc::clone(&group));
        Ok(group)
    }

    fn get(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.lock().get(name).cloned()
    }

    fn all(&self) -> Vec<Arc<Group>> {
        self.groups.lock().values().cloned().collect()
    }
}

/// Builder for [`Server`].
pub struct ServerBuilder {
    spawner: TokioSpawner,
    clock: Arc<dyn Clock>,
    job_store: Option<Arc<dyn JobStore>>,
}

impl ServerBuilder {
    /// Start from a spawner; the clock defaults to [`SystemClock`] and there
    /// is no job store.
    #[must_use]
    pub fn new(spawner: TokioSpawner) -> Self {
        Self {
            spawner,
            clock: Arc::new(SystemClock),
            job_store: None,
        }
    }

    /// Clock used by crontab routines and job records.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Store receiving job records from jobs that carry a descriptor.
    #[must_use]
    pub fn job_store(mut self, store: Arc<dyn JobStore>) -> Self {
        self.job_store = Some(store);
        self
    }

    /// Build the server.
    #[must_use]
    pub fn build(self) -> Server {
        let hook = self
            .job_store
            .map(|store| Arc::new(JobHook::new(store, Arc::clone(&self.clock))));
        Server {
            spawn: Arc::new(self.spawner.clone()),
            spawner: self.spawner,
            clock: self.clock,
            hook,
            groups: GroupRegistry::default(),
            workers: Mutex::new(Vec::new()),
        }
    }
}

/// Hosts groups, background jobs and routine jobs on one runtime.
///
/// ```rust,ignore
/// let server = Server::new(TokioSpawner::current());
/// let parse = server.add_group("parse", 4, None)?;
/// parse.register_input_endpoint("in", source, None, Duration::ZERO)?;
/// parse.register_output_endpoint("out", sink, None, None)?;
/// parse.set_handle(handler, HandleConfig::new())?;
/// server.run().await;
/// ```
pub struct Server {
    spawner: TokioSpawner,
    spawn: Arc<dyn Spawn>,
    clock: Arc<dyn Clock>,
    hook: Option<Arc<JobHook>>,
    groups: GroupRegistry,
    workers: Mutex<Vec<String>>,
}

impl Server {
    /// Server with the system clock and no job store.
    #[must_use]
    pub fn new(spawner: TokioSpawner) -> Self {
        ServerBuilder::new(spawner).build()
    }

    /// Configure a server.
    #[must_use]
    pub fn builder(spawner: TokioSpawner) -> ServerBuilder {
        ServerBuilder::new(spawner)
    }

    /// Register a group with `concurrency` worker slots.
    ///
    /// The input queue holds `queue_capacity` tasks, defaulting to
    /// `concurrency`.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::DuplicateGroup`, `PipelineError::InvalidConcurrency`
    /// for zero concurrency, or `PipelineError::InvalidConfig` for a zero
    /// queue capacity.
    pub fn add_group(
        &self,
        name: &str,
        concurrency: usize,
        queue_capacity: Option<usize>,
    ) -> Result<Arc<Group>, PipelineError> {
        if concurrency == 0 {
            return Err(PipelineError::InvalidConcurrency {
                group: name.to_string(),
                concurrency,
            });
        }
        let capacity = queue_capacity.unwrap_or(concurrency);
        if capacity == 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "queue_capacity for group `{name}` must be greater than 0"
            )));
        }
        let group = self.groups.insert_with(name, || {
            Group::new(
                name.to_string(),
                concurrency,
                capacity,
                Arc::clone(&self.spawn),
                self.hook.clone(),
            )
        })?;
        info!(group = %name, concurrency, queue_capacity = capacity, "group registered");
        Ok(group)
    }

    /// Look up a group.
    #[must_use]
    pub fn group(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.get(name)
    }

    /// Registered group names, sorted.
    #[must_use]
    pub fn group_names(&self) -> Vec<String> {
        self.groups.groups.lock().keys().cloned().collect()
    }

    /// Names of background and routine jobs, in registration order.
    #[must_use]
    pub fn worker_names(&self) -> Vec<String> {
        self.workers.lock().clone()
    }

    /// Per-group counter snapshots, sorted by group name.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, GroupStats)> {
        self.groups
            .all()
            .into_iter()
            .map(|group| (group.name().to_string(), group.stats()))
            .collect()
    }

    /// Job-store hook counters, when a store is configured.
    #[must_use]
    pub fn job_hook_stats(&self) -> Option<JobHookStats> {
        self.hook.as_ref().map(|hook| hook.stats())
    }

    /// The spawner this server runs on.
    #[must_use]
    pub const fn spawner(&self) -> &TokioSpawner {
        &self.spawner
    }

    /// Spawn a one-off background job.
    ///
    /// With a `descriptor` the job record is upserted once before the body
    /// runs. A failing or panicking body is logged.
    pub fn add_worker<F>(&self, name: &str, job: F, descriptor: Option<JobDescriptor>)
    where
        F: Future<Output = AppResult<()>> + Send + 'static,
    {
        let name = name.to_string();
        self.workers.lock().push(name.clone());
        let hook = self.hook.clone();
        let launched = self.clock.now();

        self.spawn.spawn(async move {
            if let (Some(hook), Some(desc)) = (&hook, &descriptor) {
                hook.record(desc, launched, None).await;
            }
            info!(worker = %name, "background job started");
            match AssertUnwindSafe(job).catch_unwind().await {
                Ok(Ok(())) => info!(worker = %name, "background job finished"),
                Ok(Err(e)) => error!(worker = %name, error = format!("{e:#}"), "background job failed"),
                Err(panic) => error!(
                    worker = %name,
                    panic = %panic_message(panic.as_ref()),
                    "background job panicked"
                ),
            }
        });
    }

    /// Run `job` repeatedly on the schedule described by `spec`.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::InvalidSchedule` if `spec` does not validate;
    /// nothing is spawned in that case.
    pub fn add_routine_worker<F, Fut>(
        &self,
        name: &str,
        spec: &RoutineSpec,
        job: F,
        descriptor: Option<JobDescriptor>,
    ) -> Result<(), PipelineError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<()>> + Send + 'static,
    {
        let schedule = spec.schedule()?;
        self.workers.lock().push(name.to_string());
        let routine = Routine {
            name: name.to_string(),
            schedule,
            job,
            clock: Arc::clone(&self.clock),
            hook: self.hook.clone(),
            descriptor,
            launched: self.clock.now(),
        };
        self.spawn.spawn(routine.run());
        Ok(())
    }

    /// Log a startup summary and park forever.
    ///
    /// Everything registered is already running; this only keeps the caller
    /// alive. The pipeline ends with the process.
    pub async fn run(&self) -> Infallible {
        let groups = self.group_names();
        let workers = self.worker_names();
        info!(
            groups = ?groups,
            workers = ?workers,
            job_store = self.hook.is_some(),
            "pipeline server running"
        );
        std::future::pending().await
    }

    /// [`run`](Self::run) for synchronous callers.
    ///
    /// # Panics
    ///
    /// Panics when called from inside an async context.
    pub fn run_blocking(&self) -> Infallible {
        self.spawner.block_on(self.run())
    }
}

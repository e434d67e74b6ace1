//! Pipeline runtime: tasks, endpoints, groups, routing and scheduling.

pub mod endpoint;
pub mod error;
mod feed;
pub mod gate;
pub mod group;
pub mod handler;
pub mod job_store;
pub mod routine;
mod routing;
pub mod server;
pub mod spawn;
pub mod stats;
pub mod task;
pub mod worker_pool;

pub use endpoint::{
    blocking_input, blocking_output, BlockingInputEndpoint, BlockingOutputEndpoint,
    InputEndpoint, OutputEndpoint, Params,
};
pub use error::{AppResult, PipelineError};
pub use feed::IDLE_POLL;
pub use gate::Gate;
pub use group::Group;
pub use handler::{handler_fn, HandleConfig, HandleMode, HandlerContext, TaskHandler};
pub use job_store::{
    upsert_job, JobDescriptor, JobHook, JobHookStats, JobRecord, JobStore, JobTransaction,
    UpsertOutcome,
};
pub use routine::{CronFields, RoutineSchedule, RoutineSpec, CRON_TICK};
pub use server::{Server, ServerBuilder};
pub use spawn::{BoxedLoop, Spawn, SpawnExt};
pub use stats::GroupStats;
pub use task::{flatten, Fetched, HandlerOutput, Task};
pub use worker_pool::{PoolError, PoolStats, WorkerPool};

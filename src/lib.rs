//! # Prometheus Pipeline
//!
//! A task-pipeline runtime: pull work from pluggable endpoints, run it through
//! named groups at a bounded concurrency, and route every result to named
//! output endpoints.
//!
//! ## Building blocks
//!
//! - **Task**: a JSON payload with an origin tag and a destination tag.
//! - **Endpoint**: an input (`produce`) or an output (`consume`). Async
//!   endpoints run on the scheduler; blocking ones get a dedicated thread.
//! - **Group**: a named stage with a bounded input queue, `concurrency` worker
//!   slots, input bindings (each with a fetch loop and a suspend gate) and
//!   output bindings. Output bindings on the same `(endpoint, params)` pair
//!   share one queue and one drain loop.
//! - **Server**: owns the groups, one-off background jobs and routine jobs
//!   (fixed interval or crontab-style), plus an optional job store that
//!   records job execution metadata.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use prometheus_pipeline::core::{handler_fn, HandleConfig, Server, Task};
//! use prometheus_pipeline::infra::{CollectSink, VecSource};
//! use prometheus_pipeline::runtime::TokioSpawner;
//! use serde_json::json;
//!
//! let server = Server::new(TokioSpawner::current());
//! let double = server.add_group("double", 4, None)?;
//! double.register_input_endpoint("numbers", Arc::new(VecSource::new([json!(1), json!(2)])), None, Duration::ZERO)?;
//! double.register_output_endpoint("out", Arc::new(CollectSink::new()), None, None)?;
//! double.set_handle(
//!     handler_fn(|_ctx, batch: Vec<Task>| async move {
//!         Ok(batch
//!             .into_iter()
//!             .map(|t| Task::to("out", json!(t.payload.as_i64().unwrap_or(0) * 2)).into())
//!             .collect())
//!     }),
//!     HandleConfig::new(),
//! )?;
//! server.run().await;
//! ```
//!
//! For complete scenarios, see `tests/group_test.rs` and `tests/routine_test.rs`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Pipeline runtime: tasks, endpoints, groups, routing and scheduling.
pub mod core;
/// Configuration models for groups and worker pools.
pub mod config;
/// Builders to construct pipeline components from configuration.
pub mod builders;
/// Infrastructure adapters for queues, endpoints, and job stores.
pub mod infra;
/// Runtime adapter and API surface.
pub mod runtime;
/// Shared utilities.
pub mod util;

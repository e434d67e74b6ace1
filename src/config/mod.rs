//! Configuration models for groups and worker pools.

pub mod server;
pub mod worker_pool;

pub use server::{GroupConfig, ServerConfig, CONFIG_PATH_ENV};
pub use worker_pool::{WorkerPoolConfig, DEFAULT_STACK_SIZE};

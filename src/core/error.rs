//! Error types for pipeline operations.

use thiserror::Error;

use crate::core::worker_pool::PoolError;

/// Errors produced by pipeline components.
///
/// Only the configuration variants escape the registration APIs. The runtime
/// variants are logged and contained where they happen.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A group with this name is already registered on the server.
    #[error("group already registered: {0}")]
    DuplicateGroup(String),
    /// Group concurrency must be at least one.
    #[error("invalid concurrency for group `{group}`: {concurrency}")]
    InvalidConcurrency {
        /// Group name.
        group: String,
        /// Rejected concurrency value.
        concurrency: usize,
    },
    /// An input or output binding with this name already exists in the group.
    #[error("binding `{binding}` already registered in group `{group}`")]
    DuplicateBinding {
        /// Group name.
        group: String,
        /// Binding name.
        binding: String,
    },
    /// The binding is not an input endpoint of the group.
    #[error("unknown binding `{binding}` in group `{group}`")]
    UnknownBinding {
        /// Group name.
        group: String,
        /// Binding name.
        binding: String,
    },
    /// `set_handle` was called twice on the same group.
    #[error("handler already set for group `{0}`")]
    HandlerAlreadySet(String),
    /// Routine schedule parameters are missing, ambiguous, or out of range.
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),
    /// Any other configuration value was rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A result task named a destination with no output binding.
    #[error("no output binding for destination `{0}`")]
    Unroutable(String),
    /// The queue's other side is gone.
    #[error("queue closed")]
    QueueClosed,
    /// Endpoint-specific failure with context.
    #[error("endpoint error: {0}")]
    Endpoint(String),
    /// Job store failure with context.
    #[error("store error: {0}")]
    Store(String),
    /// Worker pool failure.
    #[error(transparent)]
    Pool(#[from] PoolError),
}

impl PipelineError {
    /// Whether this error is raised synchronously by a registration API.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(
            self,
            Self::DuplicateGroup(_)
                | Self::InvalidConcurrency { .. }
                | Self::DuplicateBinding { .. }
                | Self::UnknownBinding { .. }
                | Self::HandlerAlreadySet(_)
                | Self::InvalidSchedule(_)
                | Self::InvalidConfig(_)
        )
    }
}

/// Application-facing result using anyhow for handlers and jobs.
pub type AppResult<T> = Result<T, anyhow::Error>;

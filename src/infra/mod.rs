//! Infrastructure adapters for queues, endpoints, and job stores.

pub mod endpoint;
pub mod queue;
pub mod store;

pub use endpoint::{ChannelSource, CollectSink, VecSource};
pub use queue::BoundedQueue;
pub use store::{FileJobStore, InMemoryJobStore};

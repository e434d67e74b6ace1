//! Endpoint implementations.

pub mod memory;

pub use memory::{ChannelSource, CollectSink, VecSource};

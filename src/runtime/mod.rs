//! Runtime adapter and API surface.

pub mod api;
pub mod tokio_spawner;

pub use api::{health, list_groups, GroupSnapshot, Health};
pub use tokio_spawner::TokioSpawner;

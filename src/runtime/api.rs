//! API-facing snapshot models.

use serde::{Deserialize, Serialize};

use crate::core::{GroupStats, Server};

/// Group snapshot data for listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSnapshot {
    /// Group name.
    pub name: String,
    /// Worker slots.
    pub concurrency: usize,
    /// Input queue capacity.
    pub queue_capacity: usize,
    /// Input binding names.
    pub inputs: Vec<String>,
    /// Output binding names.
    pub outputs: Vec<String>,
    /// Counters.
    pub stats: GroupStats,
}

/// Health response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
    /// Registered groups.
    pub groups: usize,
    /// Background and routine jobs.
    pub workers: usize,
    /// Failed job-store upserts, when a store is configured.
    pub job_store_failures: Option<u64>,
}

/// Snapshot every group on `server`, sorted by name.
#[must_use]
pub fn list_groups(server: &Server) -> Vec<GroupSnapshot> {
    server
        .group_names()
        .into_iter()
        .filter_map(|name| server.group(&name))
        .map(|group| GroupSnapshot {
            name: group.name().to_string(),
            concurrency: group.concurrency(),
            queue_capacity: group.queue_capacity(),
            inputs: group.input_bindings(),
            outputs: group.output_bindings(),
            stats: group.stats(),
        })
        .collect()
}

/// Liveness summary. Not ok once the job store has failed more often than it
/// has succeeded.
#[must_use]
pub fn health(server: &Server) -> Health {
    let hook = server.job_hook_stats();
    Health {
        ok: hook.is_none_or(|stats| stats.failures <= stats.upserts),
        groups: server.group_names().len(),
        workers: server.worker_names().len(),
        job_store_failures: hook.map(|stats| stats.failures),
    }
}

//! Output routing table and the drain loops behind it.
//!
//! Every distinct `(endpoint, params)` pair owns one bounded queue and one
//! drain loop. Output binding names are aliases onto those queues.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::core::endpoint::endpoint_id;
use crate::core::stats::GroupCounters;
use crate::core::{flatten, HandlerOutput, OutputEndpoint, Params, PipelineError, Task};
use crate::infra::queue::BoundedQueue;

/// Queue feeding one `(endpoint, params)` pair.
pub(crate) struct OutputQueue {
    pub endpoint: Arc<dyn OutputEndpoint>,
    pub params: Params,
    pub queue: BoundedQueue<Task>,
}

/// Output binding names and the queues they resolve to.
#[derive(Default)]
pub(crate) struct OutputTable {
    by_name: HashMap<String, Arc<OutputQueue>>,
    by_pair: HashMap<(usize, String), Arc<OutputQueue>>,
}

impl OutputTable {
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Bind `name` to `(endpoint, params)`.
    ///
    /// Returns the queue when the pair is new; the caller must start its
    /// drain loop. Returns `None` when `name` became an alias of an existing
    /// queue.
    pub fn bind(
        &mut self,
        name: &str,
        endpoint: Arc<dyn OutputEndpoint>,
        params: Params,
        buffer_size: usize,
    ) -> Option<Arc<OutputQueue>> {
        let key = (endpoint_id(&endpoint), params.to_string());
        if let Some(existing) = self.by_pair.get(&key) {
            self.by_name.insert(name.to_string(), Arc::clone(existing));
            return None;
        }
        let out = Arc::new(OutputQueue {
            endpoint,
            params,
            queue: BoundedQueue::new(buffer_size),
        });
        self.by_pair.insert(key, Arc::clone(&out));
        self.by_name.insert(name.to_string(), Arc::clone(&out));
        Some(out)
    }

    pub fn resolve(&self, destination: &str) -> Option<Arc<OutputQueue>> {
        self.by_name.get(destination).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.by_name.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of distinct queues, i.e. drain loops.
    pub fn queue_count(&self) -> usize {
        self.by_pair.len()
    }
}

/// Hand queued tasks to `out.endpoint`, forever.
pub(crate) async fn drain_loop(group: String, out: Arc<OutputQueue>, counters: Arc<GroupCounters>) {
    let max_batch = out.queue.capacity();
    debug!(group = %group, params = %out.params, "drain loop started");
    while let Some(batch) = out.queue.pull_ready(max_batch).await {
        let count = batch.len() as u64;
        let items = batch
            .into_iter()
            .map(|task| (out.params.clone(), task))
            .collect();
        match out.endpoint.consume(items).await {
            Ok(()) => {
                counters.delivered.fetch_add(count, Ordering::Relaxed);
            }
            Err(e) => {
                counters.delivery_failures.fetch_add(count, Ordering::Relaxed);
                error!(group = %group, params = %out.params, count, error = %e, "output endpoint rejected batch; dropped");
            }
        }
    }
}

/// Flatten handler output and push each task to its destination's queue.
///
/// A task without an origin is stamped with `group`. Unknown destinations
/// are logged and dropped.
pub(crate) async fn route<R>(group: &str, resolve: R, outputs: Vec<HandlerOutput>, counters: &GroupCounters)
where
    R: Fn(&str) -> Option<Arc<OutputQueue>>,
{
    for mut task in flatten(outputs) {
        if task.origin.is_empty() {
            task.origin = group.to_string();
        }
        let Some(out) = resolve(&task.destination) else {
            counters.unroutable.fetch_add(1, Ordering::Relaxed);
            let err = PipelineError::Unroutable(task.destination.clone());
            error!(group = %group, origin = %task.origin, error = %err, "result task dropped");
            continue;
        };
        if out.queue.push(task).await.is_err() {
            warn!(group = %group, "output queue closed; result task dropped");
            continue;
        }
        counters.routed.fetch_add(1, Ordering::Relaxed);
    }
}

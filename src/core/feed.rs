//! Input bindings and the fetch loop that feeds a group's input queue.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::core::stats::GroupCounters;
use crate::core::{Gate, InputEndpoint, Task};
use crate::infra::queue::BoundedQueue;

/// Delay before polling again when an endpoint had nothing or failed.
pub const IDLE_POLL: Duration = Duration::from_millis(100);

/// One input binding, as handed to its fetch loop.
pub(crate) struct InputBinding {
    pub name: String,
    pub endpoint: Arc<dyn InputEndpoint>,
    pub point: Option<String>,
    pub interval: Duration,
    pub gate: Arc<Gate>,
}

/// Poll `binding` forever, admitting each item into `queue`.
///
/// The gate is checked before polling and again before admitting, and a push
/// waiting for room is abandoned when the gate closes. An item fetched just
/// before a suspension is held until the binding resumes.
pub(crate) async fn fetch_loop(
    group: String,
    binding: InputBinding,
    queue: BoundedQueue<Task>,
    counters: Arc<GroupCounters>,
) {
    let idle = binding.interval.max(IDLE_POLL);
    info!(
        group = %group,
        binding = %binding.name,
        point = ?binding.point,
        interval_ms = binding.interval.as_millis(),
        "fetch loop started"
    );

    loop {
        binding.gate.wait_open().await;
        match binding.endpoint.produce(binding.point.as_deref()).await {
            Ok(Some(item)) => {
                let mut held = item.into_task(&binding.name, &group);
                loop {
                    binding.gate.wait_open().await;
                    match queue.push_unless(held, binding.gate.wait_closed()).await {
                        Ok(None) => break,
                        Ok(Some(task)) => {
                            debug!(group = %group, binding = %binding.name, "suspended while waiting for room; holding task");
                            held = task;
                        }
                        Err(_) => {
                            warn!(group = %group, binding = %binding.name, "input queue closed; fetch loop exiting");
                            return;
                        }
                    }
                }
                counters.admitted.fetch_add(1, Ordering::Relaxed);
                if !binding.interval.is_zero() {
                    tokio::time::sleep(binding.interval).await;
                }
            }
            Ok(None) => {
                debug!(group = %group, binding = %binding.name, "endpoint idle");
                tokio::time::sleep(idle).await;
            }
            Err(e) => {
                warn!(group = %group, binding = %binding.name, error = %e, "endpoint produce failed");
                tokio::time::sleep(idle).await;
            }
        }
    }
}

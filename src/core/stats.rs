//! Per-group counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Statistics about one group's flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupStats {
    /// Tasks pushed onto the input queue by fetch loops.
    pub admitted: u64,
    /// Handler invocations started.
    pub batches: u64,
    /// Handler invocations that returned an error or panicked.
    pub failed_batches: u64,
    /// Result tasks pushed onto an output queue.
    pub routed: u64,
    /// Result tasks dropped for lack of an output binding.
    pub unroutable: u64,
    /// Tasks acknowledged by output endpoints.
    pub delivered: u64,
    /// Tasks in `consume` calls that failed.
    pub delivery_failures: u64,
    /// Handler invocations running right now.
    pub active_handlers: u64,
    /// Highest number of simultaneous handler invocations seen.
    pub peak_handlers: u64,
    /// Tasks waiting in the input queue.
    pub queued: usize,
}

/// Internal counters (thread-safe).
#[derive(Debug, Default)]
pub(crate) struct GroupCounters {
    pub admitted: AtomicU64,
    pub batches: AtomicU64,
    pub failed_batches: AtomicU64,
    pub routed: AtomicU64,
    pub unroutable: AtomicU64,
    pub delivered: AtomicU64,
    pub delivery_failures: AtomicU64,
    active_handlers: AtomicU64,
    peak_handlers: AtomicU64,
}

impl GroupCounters {
    /// Mark a handler invocation as started.
    pub fn handler_started(&self) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        let active = self.active_handlers.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak_handlers.fetch_max(active, Ordering::AcqRel);
    }

    /// Mark a handler invocation as finished.
    pub fn handler_finished(&self, failed: bool) {
        self.active_handlers.fetch_sub(1, Ordering::AcqRel);
        if failed {
            self.failed_batches.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get a snapshot of current statistics.
    pub fn snapshot(&self, queued: usize) -> GroupStats {
        GroupStats {
            admitted: self.admitted.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            failed_batches: self.failed_batches.load(Ordering::Relaxed),
            routed: self.routed.load(Ordering::Relaxed),
            unroutable: self.unroutable.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            active_handlers: self.active_handlers.load(Ordering::Acquire),
            peak_handlers: self.peak_handlers.load(Ordering::Acquire),
            queued,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_tracks_overlap() {
        let counters = GroupCounters::default();
        counters.handler_started();
        counters.handler_started();
        counters.handler_finished(false);
        counters.handler_started();
        counters.handler_finished(true);
        counters.handler_finished(false);

        let stats = counters.snapshot(3);
        assert_eq!(stats.batches, 3);
        assert_eq!(stats.failed_batches, 1);
        assert_eq!(stats.active_handlers, 0);
        assert_eq!(stats.peak_handlers, 2);
        assert_eq!(stats.queued, 3);
    }
}

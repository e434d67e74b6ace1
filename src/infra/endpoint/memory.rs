//! In-memory endpoints for development/testing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, watch};

use crate::core::{Fetched, InputEndpoint, OutputEndpoint, Params, PipelineError, Task};

/// Source that hands out a fixed list of items in order, then reports idle.
#[derive(Debug, Default)]
pub struct VecSource {
    items: Mutex<VecDeque<Fetched>>,
}

impl VecSource {
    /// Source over unkeyed payloads.
    pub fn new(payloads: impl IntoIterator<Item = Value>) -> Self {
        Self::from_fetched(payloads.into_iter().map(Fetched::new))
    }

    /// Source over prepared items.
    pub fn from_fetched(items: impl IntoIterator<Item = Fetched>) -> Self {
        Self {
            items: Mutex::new(items.into_iter().collect()),
        }
    }

    /// Items not yet produced.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.items.lock().len()
    }
}

#[async_trait]
impl InputEndpoint for VecSource {
    async fn produce(&self, _point: Option<&str>) -> Result<Option<Fetched>, PipelineError> {
        Ok(self.items.lock().pop_front())
    }
}

/// Source fed through an unbounded channel; idle while the channel is empty.
#[derive(Debug)]
pub struct ChannelSource {
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Fetched>>,
}

impl ChannelSource {
    /// Create a source and the sender that feeds it.
    #[must_use]
    pub fn channel() -> (mpsc::UnboundedSender<Fetched>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            tx,
            Self {
                rx: tokio::sync::Mutex::new(rx),
            },
        )
    }
}

#[async_trait]
impl InputEndpoint for ChannelSource {
    async fn produce(&self, _point: Option<&str>) -> Result<Option<Fetched>, PipelineError> {
        Ok(self.rx.lock().await.try_recv().ok())
    }
}

/// Sink that records every consumed `(params, task)` pair.
#[derive(Debug)]
pub struct CollectSink {
    seen: Mutex<Vec<(Params, Task)>>,
    batches: Mutex<Vec<usize>>,
    count: watch::Sender<usize>,
    failing: AtomicBool,
}

impl Default for CollectSink {
    fn default() -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
            batches: Mutex::new(Vec::new()),
            count: watch::channel(0).0,
            failing: AtomicBool::new(false),
        }
    }
}

impl CollectSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything consumed so far, in arrival order.
    #[must_use]
    pub fn items(&self) -> Vec<(Params, Task)> {
        self.seen.lock().clone()
    }

    /// Payloads consumed so far, in arrival order.
    #[must_use]
    pub fn payloads(&self) -> Vec<Value> {
        self.seen.lock().iter().map(|(_, t)| t.payload.clone()).collect()
    }

    /// Size of every `consume` call so far.
    #[must_use]
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().clone()
    }

    /// Make subsequent `consume` calls fail (and record nothing).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }

    /// Wait until at least `n` tasks have been consumed.
    pub async fn wait_for(&self, n: usize) {
        let mut rx = self.count.subscribe();
        // The sender lives in `self`.
        let _ = rx.wait_for(|count| *count >= n).await;
    }
}

#[async_trait]
impl OutputEndpoint for CollectSink {
    async fn consume(&self, tasks: Vec<(Params, Task)>) -> Result<(), PipelineError> {
        if self.failing.load(Ordering::Acquire) {
            return Err(PipelineError::Endpoint("sink is failing".into()));
        }
        self.batches.lock().push(tasks.len());
        let total = {
            let mut seen = self.seen.lock();
            seen.extend(tasks);
            seen.len()
        };
        self.count.send_replace(total);
        Ok(())
    }
}

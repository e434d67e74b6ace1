//! In-memory bounded FIFO queue shared by fetch loops, worker slots and drain loops.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::core::PipelineError;

/// Bounded multi-producer, multi-consumer FIFO queue.
///
/// Pushing waits while the queue is full. Consumers share the receiving side
/// behind an async mutex; a batch pull holds it until the batch is complete,
/// so every batch is a contiguous run of arrivals.
pub struct BoundedQueue<T> {
    tx: mpsc::Sender<T>,
    rx: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> Clone for BoundedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: Arc::clone(&self.rx),
        }
    }
}

impl<T: Send> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items (minimum one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// Append an item, waiting while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::QueueClosed` if every consumer handle is gone.
    pub async fn push(&self, item: T) -> Result<(), PipelineError> {
        self.tx.send(item).await.map_err(|_| PipelineError::QueueClosed)
    }

    /// Append an item unless `stop` completes while waiting for room.
    ///
    /// Returns the item back when `stop` wins; nothing is enqueued then.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::QueueClosed` if every consumer handle is gone.
    pub async fn push_unless<S>(&self, item: T, stop: S) -> Result<Option<T>, PipelineError>
    where
        S: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            () = stop => Ok(Some(item)),
            permit = self.tx.reserve() => {
                permit.map_err(|_| PipelineError::QueueClosed)?.send(item);
                Ok(None)
            }
        }
    }

    /// Take the next item, waiting while the queue is empty.
    pub async fn pull(&self) -> Option<T> {
        self.rx.lock().await.recv().await
    }

    /// Take exactly `n` items in arrival order, waiting until all have arrived.
    ///
    /// Returns `None` only if the queue closes before the batch is complete.
    pub async fn pull_batch(&self, n: usize) -> Option<Vec<T>> {
        let mut rx = self.rx.lock().await;
        let mut batch = Vec::with_capacity(n);
        while batch.len() < n {
            batch.push(rx.recv().await?);
        }
        Some(batch)
    }

    /// Wait for one item, then take whatever else is ready, up to `max` in total.
    pub async fn pull_ready(&self, max: usize) -> Option<Vec<T>> {
        let mut rx = self.rx.lock().await;
        let first = rx.recv().await?;
        let mut batch = vec![first];
        while batch.len() < max {
            match rx.try_recv() {
                Ok(item) => batch.push(item),
                Err(_) => break,
            }
        }
        Some(batch)
    }

    /// Items currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of queued items.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fifo_order() {
        let q = BoundedQueue::new(8);
        for i in 0..5 {
            q.push(i).await.unwrap();
        }
        assert_eq!(q.len(), 5);
        for i in 0..5 {
            assert_eq!(q.pull().await, Some(i));
        }
        assert!(q.is_empty());
    }

    #[tokio::test]
    async fn test_pull_batch_waits_for_full_batch() {
        let q = BoundedQueue::new(8);
        q.push(1).await.unwrap();

        let consumer = {
            let q = q.clone();
            tokio::spawn(async move { q.pull_batch(3).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!consumer.is_finished());

        q.push(2).await.unwrap();
        q.push(3).await.unwrap();
        let batch = consumer.await.unwrap();
        assert_eq!(batch, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_push_blocks_when_full() {
        let q = BoundedQueue::new(1);
        q.push("a").await.unwrap();
        let blocked = tokio::time::timeout(Duration::from_millis(20), q.push("b")).await;
        assert!(blocked.is_err(), "second push must wait for room");

        assert_eq!(q.pull().await, Some("a"));
        q.push("c").await.unwrap();
        assert_eq!(q.pull().await, Some("c"));
    }

    #[tokio::test]
    async fn test_pull_ready_takes_what_is_available() {
        let q = BoundedQueue::new(8);
        for i in 0..4 {
            q.push(i).await.unwrap();
        }
        assert_eq!(q.pull_ready(3).await, Some(vec![0, 1, 2]));
        assert_eq!(q.pull_ready(3).await, Some(vec![3]));
    }

    #[tokio::test]
    async fn test_push_unless_returns_item_when_stopped() {
        let q = BoundedQueue::new(1);
        q.push(1).await.unwrap();

        let back = q.push_unless(2, std::future::ready(())).await.unwrap();
        assert_eq!(back, Some(2));
        assert_eq!(q.len(), 1);

        assert_eq!(q.pull().await, Some(1));
        let sent = q.push_unless(3, std::future::pending()).await.unwrap();
        assert_eq!(sent, None);
        assert_eq!(q.pull().await, Some(3));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let q = BoundedQueue::<u8>::new(0);
        assert_eq!(q.capacity(), 1);
    }
}

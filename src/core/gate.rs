//! Per-binding suspend/resume gate.

use tokio::sync::watch;

/// Admission gate for one input binding.
///
/// A fetch loop waits at the gate before polling its endpoint and again before
/// admitting what it fetched, so a suspension stops admissions without losing
/// or duplicating the item in hand.
#[derive(Debug)]
pub struct Gate {
    open: watch::Sender<bool>,
}

impl Gate {
    /// Create an open gate.
    #[must_use]
    pub fn new() -> Self {
        let (open, _) = watch::channel(true);
        Self { open }
    }

    /// Close the gate; waiters block until [`resume`](Self::resume).
    pub fn suspend(&self) {
        self.open.send_replace(false);
    }

    /// Reopen the gate and wake all waiters.
    pub fn resume(&self) {
        self.open.send_replace(true);
    }

    /// Whether the gate is currently open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.open.borrow()
    }

    /// Wait until the gate is open. Returns immediately when it already is.
    pub async fn wait_open(&self) {
        let mut rx = self.open.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|open| *open).await;
    }

    /// Wait until the gate is closed. Returns immediately when it already is.
    pub async fn wait_closed(&self) {
        let mut rx = self.open.subscribe();
        let _ = rx.wait_for(|open| !*open).await;
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

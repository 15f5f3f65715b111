//! Fan-out of sync progress to observers.

use filesync_core::SyncStepInfo;
use tokio::sync::broadcast;

/// Publishes [`SyncStepInfo`] snapshots to any number of subscribers.
///
/// Publishing never blocks and never fails: with no subscribers the snapshot
/// is dropped, and a subscriber that falls more than `capacity` snapshots
/// behind sees `RecvError::Lagged` and skips ahead.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: broadcast::Sender<SyncStepInfo>,
}

impl ProgressReporter {
    /// Create a reporter buffering up to `capacity` snapshots per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Send a snapshot to every current subscriber.
    pub fn publish(&self, step: SyncStepInfo) {
        // Err only means nobody is listening.
        let _ = self.tx.send(step);
    }

    /// Subscribe to snapshots published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncStepInfo> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

//! # Snapshot Handoff
//!
//! Single-slot, latest-wins transfer between the fusion producer and the
//! snapshot consumer. A push overwrites whatever the consumer has not taken
//! yet, so memory stays bounded and the consumer never sees a backlog.

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, warn};

use super::snapshot::Snapshot;
use crate::control::state::NodeState;

#[derive(Debug, Default)]
pub struct SnapshotHandoff {
    slot: Mutex<Option<Snapshot>>,
    wake: Notify,
}

impl SnapshotHandoff {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<Snapshot>> {
        // The slot holds plain data, a panicked holder cannot break it
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store `snapshot`, replacing any unconsumed one, and wake the consumer
    ///
    /// # Returns
    ///
    /// `true` if an older snapshot was overwritten.
    pub fn push(&self, snapshot: Snapshot) -> bool {
        let superseded = self.slot().replace(snapshot).is_some();
        self.wake.notify_one();
        superseded
    }

    /// Take the snapshot if one is waiting
    pub fn try_take(&self) -> Option<Snapshot> {
        self.slot().take()
    }

    /// Wait for the next snapshot and take it
    pub async fn take(&self) -> Snapshot {
        loop {
            if let Some(snapshot) = self.try_take() {
                return snapshot;
            }
            self.wake.notified().await;
        }
    }
}

/// Forward every handed-off snapshot to the live slot and the persist queue
///
/// Enqueueing waits while the queue is full.
pub async fn run_consumer(
    handoff: Arc<SnapshotHandoff>,
    state: Arc<NodeState>,
    persist_tx: mpsc::Sender<Arc<Snapshot>>,
) {
    loop {
        let snapshot = Arc::new(handoff.take().await);
        debug!(
            "Snapshot valid_time={} status={}",
            snapshot.valid_time,
            snapshot.fix_status().as_str()
        );

        state.publish_snapshot(Arc::clone(&snapshot));
        if persist_tx.send(snapshot).await.is_err() {
            warn!("Persist queue closed, snapshot not logged");
        }
    }
}

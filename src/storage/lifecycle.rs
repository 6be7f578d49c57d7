//! # Log Lifecycle
//!
//! One worker owns the store. It inserts queued snapshots and, on the erase
//! poll cadence, drives `idle -> erasing -> erased -> idle`:
//!
//! - `erase_requested` set: logging is forced off, the queue is drained,
//!   the store is destroyed and recreated, and the worker holds
//! - `erase_requested` cleared: status returns to idle and logging resumes
//!
//! Nothing is inserted while holding. Store calls are synchronous; on a
//! multi-threaded runtime they run under `block_in_place`.

use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::mpsc;
use tokio::task::block_in_place;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::LogSink;
use crate::control::{EraseStatus, NodeState};
use crate::telemetry::{LogRecord, Snapshot};

/// Run a blocking store call without stalling other tasks on this worker
fn blocking<T>(call: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => block_in_place(call),
        _ => call(),
    }
}

/// Store owner fed by the snapshot consumer
pub struct PersistentLog<S: LogSink> {
    sink: S,
    state: Arc<NodeState>,
    queue: mpsc::Receiver<Arc<Snapshot>>,
    erase_poll: Duration,
    holding: bool,
}

impl<S: LogSink> PersistentLog<S> {
    pub fn new(
        sink: S,
        state: Arc<NodeState>,
        queue: mpsc::Receiver<Arc<Snapshot>>,
        erase_poll: Duration,
    ) -> Self {
        Self {
            sink,
            state,
            queue,
            erase_poll,
            holding: false,
        }
    }

    /// Serve the queue and the erase supervisor until the queue closes
    pub async fn run(mut self) {
        let mut ticker = interval(self.erase_poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                received = self.queue.recv() => match received {
                    Some(snapshot) => self.ingest(&snapshot),
                    None => {
                        info!("Persist queue closed, log worker stopping");
                        return;
                    }
                },
                _ = ticker.tick() => self.supervise_erase(),
            }
        }
    }

    /// Insert one snapshot if it is time-valid and logging is on
    pub fn ingest(&mut self, snapshot: &Snapshot) {
        if self.holding || !snapshot.valid_time || !self.state.control().log_enabled {
            return;
        }

        let record = LogRecord::from(snapshot);
        let sink = &mut self.sink;
        match blocking(|| sink.insert(&record)) {
            Ok(()) => self.state.set_persist_error(false),
            Err(e) => {
                warn!("Failed to persist snapshot: {}", e);
                self.state.set_persist_error(true);
                self.state.raise_alert();
            }
        }
    }

    /// One step of the erase state machine
    pub fn supervise_erase(&mut self) {
        let requested = self.state.control().erase_requested;

        if !self.holding && requested {
            self.erase();
        } else if self.holding && !requested {
            self.holding = false;
            self.state.update_control(|control| {
                control.erase_status = EraseStatus::Idle;
                control.log_enabled = true;
            });
            info!("Erase acknowledged, logging resumed");
        }
    }

    fn erase(&mut self) {
        info!("Erasing persistent log");
        self.state.update_control(|control| {
            control.erase_status = EraseStatus::Erasing;
            control.log_enabled = false;
        });

        let mut dropped = 0usize;
        while self.queue.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!("Dropped {} queued snapshots before erase", dropped);
        }

        let sink = &mut self.sink;
        match blocking(|| sink.wipe()) {
            Ok(()) => {
                self.state.set_erase_status(EraseStatus::Erased);
                info!("Persistent log erased");
            }
            Err(e) => {
                error!("Erase failed: {}", e);
                self.state.set_persist_error(true);
                self.state.set_erase_status(EraseStatus::Error(e.to_string()));
            }
        }
        self.holding = true;
    }
}

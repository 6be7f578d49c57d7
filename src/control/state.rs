//! # Shared Runtime State
//!
//! Control flags set by the remote operator, the erase lifecycle status,
//! connectivity and error flags, and the most recent snapshot.

use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;

use crate::telemetry::Snapshot;

/// Progress of a log erase
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EraseStatus {
    #[default]
    Idle,
    Erasing,
    Erased,
    Error(String),
}

impl fmt::Display for EraseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EraseStatus::Idle => write!(f, "-"),
            EraseStatus::Erasing => write!(f, "erasing"),
            EraseStatus::Erased => write!(f, "erased"),
            EraseStatus::Error(reason) => write!(f, "error: {}", reason),
        }
    }
}

impl Serialize for EraseStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Operator-controlled flags plus the erase status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlState {
    pub stream_enabled: bool,
    pub log_enabled: bool,
    pub erase_requested: bool,
    pub erase_status: EraseStatus,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            stream_enabled: true,
            log_enabled: true,
            erase_requested: false,
            erase_status: EraseStatus::Idle,
        }
    }
}

/// State shared by every worker of the node
#[derive(Debug)]
pub struct NodeState {
    control: RwLock<ControlState>,
    last_persist_error: AtomicBool,
    transport_connected: AtomicBool,
    alert: AtomicBool,
    latest: watch::Sender<Option<Arc<Snapshot>>>,
}

impl Default for NodeState {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeState {
    pub fn new() -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            control: RwLock::new(ControlState::default()),
            last_persist_error: AtomicBool::new(false),
            transport_connected: AtomicBool::new(false),
            alert: AtomicBool::new(false),
            latest,
        }
    }

    // ControlState is plain data, a writer that panicked cannot leave it torn
    fn read(&self) -> RwLockReadGuard<'_, ControlState> {
        self.control.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, ControlState> {
        self.control.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Consistent copy of the control flags
    pub fn control(&self) -> ControlState {
        self.read().clone()
    }

    /// Mutate the control flags under the write lock
    ///
    /// # Returns
    ///
    /// A copy of the state after the update.
    pub fn update_control<F>(&self, update: F) -> ControlState
    where
        F: FnOnce(&mut ControlState),
    {
        let mut control = self.write();
        update(&mut control);
        control.clone()
    }

    pub fn set_erase_status(&self, status: EraseStatus) {
        self.write().erase_status = status;
    }

    pub fn last_persist_error(&self) -> bool {
        self.last_persist_error.load(Ordering::Acquire)
    }

    pub fn set_persist_error(&self, failed: bool) {
        self.last_persist_error.store(failed, Ordering::Release);
    }

    pub fn transport_connected(&self) -> bool {
        self.transport_connected.load(Ordering::Acquire)
    }

    pub fn set_transport_connected(&self, connected: bool) {
        self.transport_connected.store(connected, Ordering::Release);
    }

    /// Request the alert pattern on the next indicator cycle
    pub fn raise_alert(&self) {
        self.alert.store(true, Ordering::Release);
    }

    /// Consume a pending alert
    pub fn take_alert(&self) -> bool {
        self.alert.swap(false, Ordering::AcqRel)
    }

    /// Replace the latest snapshot and wake its watchers
    pub fn publish_snapshot(&self, snapshot: Arc<Snapshot>) {
        self.latest.send_replace(Some(snapshot));
    }

    pub fn latest_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.latest.borrow().clone()
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<Option<Arc<Snapshot>>> {
        self.latest.subscribe()
    }

    pub fn latest_battery_percent(&self) -> Option<f64> {
        self.latest
            .borrow()
            .as_ref()
            .and_then(|snapshot| snapshot.battery.map(|b| b.percent))
    }
}

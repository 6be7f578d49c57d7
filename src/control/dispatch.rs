//! # Control-Plane Dispatch
//!
//! Inbound control messages and the two outbound publishers.
//!
//! Live data is throttled on the trailing edge: after a successful publish
//! the next one waits out the window, then sends the newest snapshot seen
//! by then. Snapshots arriving inside the window are superseded, never
//! queued.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::state::{ControlState, EraseStatus, NodeState};
use super::transport::Transport;
use crate::error::Result;
use crate::telemetry::LogRecord;

/// Operator control message
///
/// Every field is optional; an absent field keeps its current value.
/// Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ControlMessage {
    #[serde(default, alias = "streamdata")]
    pub stream_enabled: Option<bool>,

    #[serde(default, alias = "logdata")]
    pub log_enabled: Option<bool>,

    #[serde(default, alias = "deletelog")]
    pub erase_requested: Option<bool>,
}

impl ControlMessage {
    /// Apply the present fields to `control`
    pub fn apply(&self, control: &mut ControlState) {
        if let Some(stream) = self.stream_enabled {
            control.stream_enabled = stream;
        }
        if let Some(log) = self.log_enabled {
            control.log_enabled = log;
        }
        if let Some(erase) = self.erase_requested {
            control.erase_requested = erase;
        }
    }

    /// Decode a JSON control payload
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::TrackerError::Json`] if the payload is not a
    /// JSON object of optional booleans.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

/// Parse and apply one control payload
///
/// Malformed payloads are logged and ignored.
///
/// # Returns
///
/// The control state after the update, or `None` if the payload was
/// rejected.
pub fn handle_control_payload(state: &NodeState, payload: &[u8]) -> Option<ControlState> {
    let message = match ControlMessage::parse(payload) {
        Ok(message) => message,
        Err(e) => {
            warn!("Ignoring malformed control message: {}", e);
            return None;
        }
    };

    let control = state.update_control(|control| message.apply(control));
    info!(
        "Control message applied: stream_enabled={}, log_enabled={}, erase_requested={}",
        control.stream_enabled, control.log_enabled, control.erase_requested
    );
    Some(control)
}

/// Periodic status report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusPayload {
    pub identifier: String,
    pub stream_enabled: bool,
    pub log_enabled: bool,
    pub erase_status: EraseStatus,
    pub last_persist_error: bool,
    pub latest_battery_percent: Option<f64>,
}

impl StatusPayload {
    pub fn collect(identifier: &str, state: &NodeState) -> Self {
        let control = state.control();
        Self {
            identifier: identifier.to_string(),
            stream_enabled: control.stream_enabled,
            log_enabled: control.log_enabled,
            erase_status: control.erase_status,
            last_persist_error: state.last_persist_error(),
            latest_battery_percent: state.latest_battery_percent(),
        }
    }
}

/// Publish the latest snapshot, gated by `stream_enabled`, at most once per
/// `window`
pub async fn run_live_publisher(
    state: Arc<NodeState>,
    transport: Arc<dyn Transport>,
    topic: String,
    window: Duration,
) {
    let mut snapshots = state.subscribe_snapshots();
    let mut last_publish: Option<Instant> = None;

    info!("Live publisher on {} every {:?}", topic, window);

    loop {
        if snapshots.changed().await.is_err() {
            return;
        }

        if let Some(last) = last_publish {
            let opens = last + window;
            if Instant::now() < opens {
                sleep_until(opens).await;
            }
        }

        // Newest snapshot at publish time
        let Some(snapshot) = snapshots.borrow_and_update().clone() else {
            continue;
        };
        if !state.control().stream_enabled {
            continue;
        }

        let payload = match encode(&LogRecord::from(snapshot.as_ref())) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to encode live payload: {}", e);
                continue;
            }
        };

        match transport.publish(&topic, payload).await {
            Ok(()) => last_publish = Some(Instant::now()),
            Err(e) => {
                debug!("Live publish failed: {}", e);
                state.raise_alert();
            }
        }
    }
}

/// Publish a [`StatusPayload`] every `period`
pub async fn run_status_publisher(
    state: Arc<NodeState>,
    transport: Arc<dyn Transport>,
    topic: String,
    identifier: String,
    period: Duration,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let status = StatusPayload::collect(&identifier, &state);
        let payload = match encode(&status) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to encode status payload: {}", e);
                continue;
            }
        };
        match transport.publish(&topic, payload).await {
            Ok(()) => debug!("Published status on {}", topic),
            Err(e) => debug!("Status publish failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::transport::MockTransport;
    use crate::error::TrackerError;
    use crate::sensors::BatteryReading;
    use crate::telemetry::Snapshot;
    use serde_json::Value;
    use std::sync::Mutex;

    /// Transport that records every publish
    #[derive(Default)]
    struct RecordingTransport {
        published: Mutex<Vec<(Instant, String, Value)>>,
    }

    #[async_trait::async_trait]
    impl Transport for RecordingTransport {
        async fn publish(&self, topic: &str, payload: Vec<u8>) -> crate::error::Result<()> {
            let value = serde_json::from_slice(&payload).unwrap();
            self.published
                .lock()
                .unwrap()
                .push((Instant::now(), topic.to_string(), value));
            Ok(())
        }

        fn is_connected(&self) -> bool {
            true
        }
    }

    fn snapshot(id: &str) -> Arc<Snapshot> {
        Arc::new(Snapshot::new(id, true, Default::default()))
    }

    #[test]
    fn test_partial_update_keeps_other_flags() {
        let state = NodeState::new();
        state.update_control(|c| {
            c.stream_enabled = false;
            c.erase_requested = true;
        });

        let control = handle_control_payload(&state, br#"{"log_enabled": false}"#).unwrap();
        assert!(!control.log_enabled);
        assert!(!control.stream_enabled);
        assert!(control.erase_requested);
    }

    #[test]
    fn test_empty_message_changes_nothing() {
        let state = NodeState::new();
        let before = state.control();
        let after = handle_control_payload(&state, b"{}").unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let state = NodeState::new();
        let control =
            handle_control_payload(&state, br#"{"stream_enabled": false, "volume": 11}"#).unwrap();
        assert!(!control.stream_enabled);
    }

    #[test]
    fn test_legacy_keys_accepted() {
        let state = NodeState::new();
        let control =
            handle_control_payload(&state, br#"{"streamdata": false, "deletelog": true}"#).unwrap();
        assert!(!control.stream_enabled);
        assert!(control.log_enabled);
        assert!(control.erase_requested);
    }

    #[test]
    fn test_parse_error_is_json_error() {
        assert!(matches!(
            ControlMessage::parse(b"not json"),
            Err(TrackerError::Json(_))
        ));
        assert_eq!(
            ControlMessage::parse(br#"{"deletelog": true}"#).unwrap(),
            ControlMessage {
                erase_requested: Some(true),
                ..ControlMessage::default()
            }
        );
    }

    #[test]
    fn test_malformed_payload_ignored() {
        let state = NodeState::new();
        let before = state.control();
        assert!(handle_control_payload(&state, b"not json").is_none());
        assert!(handle_control_payload(&state, br#"{"log_enabled": "no"}"#).is_none());
        assert!(handle_control_payload(&state, b"42").is_none());
        assert_eq!(state.control(), before);
    }

    #[test]
    fn test_status_payload_shape() {
        let state = NodeState::new();
        let mut snap = Snapshot::new("boat1", true, Default::default());
        snap.battery = Some(BatteryReading {
            voltage: 3.8,
            percent: 64.0,
        });
        state.publish_snapshot(Arc::new(snap));
        state.set_persist_error(true);

        let json = serde_json::to_value(StatusPayload::collect("boat1", &state)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "identifier": "boat1",
                "stream_enabled": true,
                "log_enabled": true,
                "erase_status": "-",
                "last_persist_error": true,
                "latest_battery_percent": 64.0,
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_publish_throttled_trailing_edge() {
        let state = Arc::new(NodeState::new());
        let transport = Arc::new(RecordingTransport::default());
        let window = Duration::from_millis(100);

        let task = tokio::spawn(run_live_publisher(
            Arc::clone(&state),
            transport.clone(),
            "boatlive".to_string(),
            window,
        ));
        tokio::task::yield_now().await;

        // Flood: one snapshot per 10 ms for 500 ms
        for i in 0..50 {
            state.publish_snapshot(snapshot(&format!("s{}", i)));
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(300)).await;
        task.abort();

        let published = transport.published.lock().unwrap();
        assert!(published.len() >= 4, "only {} publishes", published.len());
        assert!(published.len() <= 6, "{} publishes", published.len());
        for pair in published.windows(2) {
            assert!(pair[1].0 - pair[0].0 >= window);
        }
        let (_, topic, last) = published.last().unwrap();
        assert_eq!(topic, "boatlive");
        assert_eq!(last["device_id"], "s49");
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_publish_gated_by_stream_flag() {
        let state = Arc::new(NodeState::new());
        state.update_control(|c| c.stream_enabled = false);

        let mut transport = MockTransport::new();
        transport.expect_publish().never();
        let task = tokio::spawn(run_live_publisher(
            Arc::clone(&state),
            Arc::new(transport),
            "boatlive".to_string(),
            Duration::from_millis(100),
        ));
        tokio::task::yield_now().await;

        state.publish_snapshot(snapshot("s0"));
        tokio::time::sleep(Duration::from_millis(250)).await;
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_publish_failure_raises_alert() {
        let state = Arc::new(NodeState::new());
        let mut transport = MockTransport::new();
        transport
            .expect_publish()
            .returning(|_, _| Err(TrackerError::Transport("not connected".to_string())));

        let task = tokio::spawn(run_live_publisher(
            Arc::clone(&state),
            Arc::new(transport),
            "boatlive".to_string(),
            Duration::from_millis(100),
        ));
        tokio::task::yield_now().await;

        state.publish_snapshot(snapshot("s0"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(state.take_alert());
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_published_periodically() {
        let state = Arc::new(NodeState::new());
        let transport = Arc::new(RecordingTransport::default());

        let task = tokio::spawn(run_status_publisher(
            Arc::clone(&state),
            transport.clone(),
            "boatstatus".to_string(),
            "boat1".to_string(),
            Duration::from_secs(2),
        ));
        tokio::time::sleep(Duration::from_millis(4500)).await;
        task.abort();

        let published = transport.published.lock().unwrap();
        assert_eq!(published.len(), 3);
        assert_eq!(published[0].1, "boatstatus");
        assert_eq!(published[0].2["identifier"], "boat1");
        assert_eq!(published[0].2["erase_status"], "-");
    }
}

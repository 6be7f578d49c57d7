//! # Status Indicator
//!
//! Maps node state to a light pattern once per cycle. A pending alert wins
//! that cycle and is consumed; otherwise the pattern follows fix status,
//! time validity, connectivity and whether logging is on.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, info};

use crate::control::NodeState;
use crate::nmea::protocol::FixStatus;

const PULSE: Duration = Duration::from_millis(100);
const ALERT_REPEAT: u32 = 5;

/// Colour family shown by the indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualCode {
    /// Red
    Alert,
    /// Orange
    Searching,
    /// Pink
    Tracking,
}

/// One indicator cycle: `repeat` on/off pulses of `pulse` each
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPattern {
    pub visual_code: VisualCode,
    pub pulse: Duration,
    pub repeat: u32,
}

impl StatusPattern {
    pub const ALERT: StatusPattern = StatusPattern {
        visual_code: VisualCode::Alert,
        pulse: PULSE,
        repeat: ALERT_REPEAT,
    };

    fn searching(repeat: u32) -> Self {
        Self {
            visual_code: VisualCode::Searching,
            pulse: PULSE,
            repeat,
        }
    }

    fn tracking(repeat: u32) -> Self {
        Self {
            visual_code: VisualCode::Tracking,
            pulse: PULSE,
            repeat,
        }
    }

    /// Time to play the pattern to completion
    pub fn play_time(&self) -> Duration {
        self.pulse * 2 * self.repeat
    }
}

/// Pattern for a node without a pending alert
///
/// | fix    | valid time | connected | logging | pattern      |
/// |--------|------------|-----------|---------|--------------|
/// | no fix | any        | no / yes  | any     | searching 1/2|
/// | fix    | no         | no / yes  | any     | searching 1/2|
/// | fix    | yes        | no        | any     | tracking 1   |
/// | fix    | yes        | yes       | yes     | tracking 2   |
/// | fix    | yes        | yes       | no      | tracking 3   |
pub fn select_pattern(
    fix_status: FixStatus,
    valid_time: bool,
    connected: bool,
    log_enabled: bool,
) -> StatusPattern {
    if fix_status == FixStatus::NoFix || !valid_time {
        return StatusPattern::searching(if connected { 2 } else { 1 });
    }

    match (connected, log_enabled) {
        (false, _) => StatusPattern::tracking(1),
        (true, true) => StatusPattern::tracking(2),
        (true, false) => StatusPattern::tracking(3),
    }
}

/// Light output, fire-and-forget
#[cfg_attr(test, mockall::automock)]
pub trait IndicatorActuator: Send {
    fn set_pattern(&mut self, pattern: &StatusPattern);
}

/// Actuator for nodes without a light; reports patterns through tracing
#[derive(Debug, Default)]
pub struct TracingIndicator {
    last: Option<StatusPattern>,
}

impl IndicatorActuator for TracingIndicator {
    fn set_pattern(&mut self, pattern: &StatusPattern) {
        if self.last.as_ref() != Some(pattern) {
            debug!(
                "Indicator: {:?} x{} ({:?} pulse)",
                pattern.visual_code, pattern.repeat, pattern.pulse
            );
            self.last = Some(*pattern);
        }
    }
}

/// Reads node state and selects the pattern for each cycle
#[derive(Debug)]
pub struct IndicatorEngine {
    state: Arc<NodeState>,
    link_monitored: bool,
}

impl IndicatorEngine {
    /// `link_monitored` adds the radio link to the connectivity condition
    pub fn new(state: Arc<NodeState>, link_monitored: bool) -> Self {
        Self {
            state,
            link_monitored,
        }
    }

    fn connected(&self) -> bool {
        let transport = self.state.transport_connected();
        if !self.link_monitored {
            return transport;
        }
        let link = self
            .state
            .latest_snapshot()
            .is_some_and(|snapshot| snapshot.link_connected);
        transport && link
    }

    /// Pattern for the next cycle, consuming a pending alert
    pub fn next_pattern(&self) -> StatusPattern {
        if self.state.take_alert() {
            return StatusPattern::ALERT;
        }

        let (fix_status, valid_time) = match self.state.latest_snapshot() {
            Some(snapshot) => (snapshot.fix_status(), snapshot.valid_time),
            None => (FixStatus::NoFix, false),
        };
        select_pattern(
            fix_status,
            valid_time,
            self.connected(),
            self.state.control().log_enabled,
        )
    }

    /// Evaluate every `cycle`, playing each pattern to completion
    pub async fn run<A: IndicatorActuator>(self, mut actuator: A, cycle: Duration) {
        let mut ticker = interval(cycle);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Indicator running every {:?}", cycle);

        loop {
            ticker.tick().await;
            let pattern = self.next_pattern();
            actuator.set_pattern(&pattern);
            sleep(pattern.play_time()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::Snapshot;
    use std::sync::Mutex;

    fn publish(state: &NodeState, status: FixStatus, valid_time: bool, link: bool) {
        let mut snapshot = Snapshot::new("boat1", valid_time, Default::default());
        snapshot.fix.status = status;
        snapshot.link_connected = link;
        state.publish_snapshot(Arc::new(snapshot));
    }

    #[test]
    fn test_searching_patterns() {
        let offline = select_pattern(FixStatus::NoFix, false, false, true);
        assert_eq!(offline.visual_code, VisualCode::Searching);
        assert_eq!(offline.repeat, 1);

        assert_eq!(select_pattern(FixStatus::NoFix, false, true, true).repeat, 2);

        let no_time = select_pattern(FixStatus::Fix, false, true, true);
        assert_eq!(no_time.visual_code, VisualCode::Searching);
    }

    #[test]
    fn test_tracking_patterns() {
        assert_eq!(
            select_pattern(FixStatus::Fix, true, false, true),
            StatusPattern::tracking(1)
        );
        assert_eq!(
            select_pattern(FixStatus::Fix, true, true, true),
            StatusPattern::tracking(2)
        );
    }

    #[test]
    fn test_online_not_recording_is_distinct() {
        let not_recording = select_pattern(FixStatus::Fix, true, true, false);
        let recording = select_pattern(FixStatus::Fix, true, true, true);
        assert_eq!(not_recording.visual_code, VisualCode::Tracking);
        assert_eq!(not_recording.repeat, 3);
        assert_ne!(not_recording, recording);
    }

    #[test]
    fn test_play_time() {
        assert_eq!(StatusPattern::ALERT.play_time(), Duration::from_millis(1000));
        assert_eq!(StatusPattern::tracking(3).play_time(), Duration::from_millis(600));
    }

    #[test]
    fn test_alert_has_priority_once() {
        let state = Arc::new(NodeState::new());
        publish(&state, FixStatus::Fix, true, true);
        let engine = IndicatorEngine::new(Arc::clone(&state), false);

        state.raise_alert();
        assert_eq!(engine.next_pattern(), StatusPattern::ALERT);
        assert_eq!(engine.next_pattern(), StatusPattern::tracking(1));
    }

    #[test]
    fn test_link_term_only_when_monitored() {
        let state = Arc::new(NodeState::new());
        state.set_transport_connected(true);
        publish(&state, FixStatus::Fix, true, false);

        let hub = IndicatorEngine::new(Arc::clone(&state), false);
        assert_eq!(hub.next_pattern().repeat, 2);

        let boat = IndicatorEngine::new(Arc::clone(&state), true);
        assert_eq!(boat.next_pattern().repeat, 1);

        publish(&state, FixStatus::Fix, true, true);
        assert_eq!(boat.next_pattern().repeat, 2);
    }

    #[test]
    fn test_no_snapshot_is_searching() {
        let state = Arc::new(NodeState::new());
        let engine = IndicatorEngine::new(state, false);
        assert_eq!(engine.next_pattern().visual_code, VisualCode::Searching);
    }

    #[test]
    fn test_actuator_receives_pattern() {
        let mut actuator = MockIndicatorActuator::new();
        actuator
            .expect_set_pattern()
            .withf(|p| p.visual_code == VisualCode::Alert)
            .times(1)
            .return_const(());
        actuator.set_pattern(&StatusPattern::ALERT);
    }

    struct Recorder(Arc<Mutex<Vec<StatusPattern>>>);

    impl IndicatorActuator for Recorder {
        fn set_pattern(&mut self, pattern: &StatusPattern) {
            self.0.lock().unwrap().push(*pattern);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_plays_each_pattern_to_completion() {
        let state = Arc::new(NodeState::new());
        state.raise_alert();
        let played = Arc::new(Mutex::new(Vec::new()));

        let engine = IndicatorEngine::new(Arc::clone(&state), false);
        let task = tokio::spawn(engine.run(Recorder(Arc::clone(&played)), Duration::from_millis(500)));

        // Alert plays 0..1000 ms, searching 1000..1200 ms, next at 1500 ms
        tokio::time::sleep(Duration::from_millis(1300)).await;
        {
            let played = played.lock().unwrap();
            assert_eq!(played.len(), 2);
            assert_eq!(played[0], StatusPattern::ALERT);
            assert_eq!(played[1].visual_code, VisualCode::Searching);
        }

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(played.lock().unwrap().len(), 3);
        task.abort();
    }
}

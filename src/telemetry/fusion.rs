//! # Fusion Producer
//!
//! Merges the latest fix with auxiliary readings into snapshots.
//!
//! - No receiver clock yet: an interim snapshot every interim period,
//!   `valid_time = false`, forced to no-fix.
//! - Receiver clock present: one snapshot per new fix timestamp,
//!   `valid_time = true`.
//!
//! The battery is sampled on its own slower cadence and cached in between.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::handoff::SnapshotHandoff;
use super::snapshot::Snapshot;
use crate::config::FusionConfig;
use crate::geo::{round_to, wrap_degrees};
use crate::nmea::protocol::{Fix, FixStatus};
use crate::sensors::{AuxReading, AuxSensor, BatteryReading, SensorKind};

/// True wind direction from compass heading and relative wind angle
///
/// # Examples
///
/// ```
/// use tracker_node::telemetry::fusion::true_wind_direction;
///
/// assert_eq!(true_wind_direction(Some(350.0), Some(20.0)), Some(10.0));
/// assert_eq!(true_wind_direction(None, Some(20.0)), None);
/// ```
pub fn true_wind_direction(heading: Option<f64>, relative_angle: Option<f64>) -> Option<f64> {
    Some(round_to(wrap_degrees(heading? + relative_angle?), 2))
}

pub struct FusionProducer {
    device_id: String,
    fix_rx: watch::Receiver<Fix>,
    sensors: Vec<Box<dyn AuxSensor>>,
    interim_period: Duration,
    poll_interval: Duration,
    battery_interval: Duration,
    battery_cache: Option<BatteryReading>,
    next_battery_due: Option<Instant>,
    last_timestamp: Option<String>,
    last_interim: Option<Instant>,
}

impl std::fmt::Debug for FusionProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FusionProducer")
            .field("device_id", &self.device_id)
            .field("sensors", &self.sensors.len())
            .field("last_timestamp", &self.last_timestamp)
            .finish_non_exhaustive()
    }
}

impl FusionProducer {
    pub fn new(
        device_id: &str,
        fix_rx: watch::Receiver<Fix>,
        sensors: Vec<Box<dyn AuxSensor>>,
        config: &FusionConfig,
    ) -> Self {
        Self {
            device_id: device_id.to_string(),
            fix_rx,
            sensors,
            interim_period: config.interim_period(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            battery_interval: Duration::from_millis(config.battery_interval_ms),
            battery_cache: None,
            next_battery_due: None,
            last_timestamp: None,
            last_interim: None,
        }
    }

    /// Decide whether a snapshot is due at `now` and build it
    pub fn tick(&mut self, now: Instant) -> Option<Snapshot> {
        let fix = self.fix_rx.borrow().clone();

        match &fix.timestamp {
            None => {
                let due = self
                    .last_interim
                    .map_or(true, |last| now.duration_since(last) >= self.interim_period);
                if !due {
                    return None;
                }
                self.last_interim = Some(now);
                Some(self.compose(fix, false, now))
            }
            Some(timestamp) => {
                if self.last_timestamp.as_ref() == Some(timestamp) {
                    return None;
                }
                self.last_timestamp = Some(timestamp.clone());
                Some(self.compose(fix, true, now))
            }
        }
    }

    fn compose(&mut self, mut fix: Fix, valid_time: bool, now: Instant) -> Snapshot {
        if !valid_time {
            fix.status = FixStatus::NoFix;
        }
        let mut snapshot = Snapshot::new(&self.device_id, valid_time, fix);

        let battery_due = self.next_battery_due.map_or(true, |due| now >= due);
        if battery_due {
            self.next_battery_due = Some(now + self.battery_interval);
        }

        for sensor in self.sensors.iter_mut() {
            let kind = sensor.kind();
            if kind == SensorKind::Battery {
                if battery_due {
                    self.battery_cache = match sensor.sample() {
                        Ok(AuxReading::Battery(reading)) => Some(reading),
                        Ok(_) => None,
                        Err(e) => {
                            debug!("Battery unavailable: {}", e);
                            None
                        }
                    };
                }
                snapshot.battery = self.battery_cache;
                continue;
            }

            match sensor.sample() {
                Ok(reading) => snapshot.apply(reading),
                Err(e) => debug!("{:?} sensor unavailable: {}", kind, e),
            }
        }

        let heading = snapshot.magnetic.map(|m| m.heading);
        if let Some(wind) = snapshot.wind.as_mut() {
            wind.true_direction = true_wind_direction(heading, wind.angle);
        }

        snapshot
    }

    /// Poll the fix forever, pushing snapshots into `handoff`
    pub async fn run(mut self, handoff: Arc<SnapshotHandoff>) {
        info!(
            "Fusion producer started ({} sensors, poll {:?}, interim {:?})",
            self.sensors.len(),
            self.poll_interval,
            self.interim_period
        );

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Some(snapshot) = self.tick(Instant::now()) {
                if handoff.push(snapshot) {
                    debug!("Unconsumed snapshot superseded");
                }
            }
        }
    }
}

//! # Snapshot and Log Record
//!
//! A [`Snapshot`] is one fused record as produced by the fusion producer.
//! A [`LogRecord`] is the same data flattened into nullable columns, used
//! both as the persisted row and as the live JSON payload.

use serde::Serialize;

use crate::nmea::protocol::{Fix, FixStatus};
use crate::sensors::{
    AuxReading, BatteryReading, InertialReading, MagneticReading, WindReading,
};

/// One fused, timestamped record. Immutable once built.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub device_id: String,
    /// True iff the fix carried a receiver timestamp
    pub valid_time: bool,
    pub fix: Fix,
    pub inertial: Option<InertialReading>,
    pub magnetic: Option<MagneticReading>,
    pub battery: Option<BatteryReading>,
    pub wind: Option<WindReading>,
    pub link_connected: bool,
    /// dBm
    pub link_signal: Option<i32>,
}

impl Snapshot {
    pub fn new(device_id: &str, valid_time: bool, fix: Fix) -> Self {
        Self {
            device_id: device_id.to_string(),
            valid_time,
            fix,
            ..Default::default()
        }
    }

    pub fn fix_status(&self) -> FixStatus {
        self.fix.status
    }

    /// Merge one auxiliary reading into the snapshot
    pub fn apply(&mut self, reading: AuxReading) {
        match reading {
            AuxReading::Inertial(r) => self.inertial = Some(r),
            AuxReading::Magnetic(r) => self.magnetic = Some(r),
            AuxReading::Battery(r) => self.battery = Some(r),
            AuxReading::Wind(r) => self.wind = Some(r),
            AuxReading::Link(r) => {
                self.link_connected = r.connected;
                self.link_signal = r.signal;
            }
        }
    }
}

/// Flat row of every snapshot field; absent values serialize as `null`
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct LogRecord {
    pub device_id: Option<String>,
    pub valid_time: bool,
    pub timestamp: Option<String>,
    pub fix_status: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub speed_over_ground: Option<f64>,
    pub course_over_ground: Option<f64>,
    pub fix_quality: Option<u8>,
    pub satellite_count: Option<u8>,
    pub horizontal_dilution: Option<f64>,
    pub altitude: Option<f64>,
    pub acc_x: Option<f64>,
    pub acc_y: Option<f64>,
    pub acc_z: Option<f64>,
    pub gyro_x: Option<f64>,
    pub gyro_y: Option<f64>,
    pub gyro_z: Option<f64>,
    pub pitch: Option<f64>,
    pub roll: Option<f64>,
    pub mag_x: Option<f64>,
    pub mag_y: Option<f64>,
    pub mag_z: Option<f64>,
    pub heading: Option<f64>,
    pub battery_voltage: Option<f64>,
    pub battery_percent: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_angle: Option<f64>,
    pub wind_speed_knots: Option<f64>,
    pub wind_true_direction: Option<f64>,
    pub link_connected: bool,
    pub link_signal: Option<i32>,
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl From<&Snapshot> for LogRecord {
    fn from(snapshot: &Snapshot) -> Self {
        let fix = &snapshot.fix;
        let inertial = snapshot.inertial.as_ref();
        let magnetic = snapshot.magnetic.as_ref();
        let battery = snapshot.battery.as_ref();
        let wind = snapshot.wind.as_ref();

        Self {
            device_id: non_empty(&snapshot.device_id),
            valid_time: snapshot.valid_time,
            timestamp: fix.timestamp.as_deref().and_then(non_empty),
            fix_status: non_empty(fix.status.as_str()),
            latitude: fix.latitude,
            longitude: fix.longitude,
            speed_over_ground: fix.speed_over_ground,
            course_over_ground: fix.course_over_ground,
            fix_quality: fix.fix_quality,
            satellite_count: fix.satellite_count,
            horizontal_dilution: fix.horizontal_dilution,
            altitude: fix.altitude,
            acc_x: inertial.map(|r| r.acc_x),
            acc_y: inertial.map(|r| r.acc_y),
            acc_z: inertial.map(|r| r.acc_z),
            gyro_x: inertial.map(|r| r.gyro_x),
            gyro_y: inertial.map(|r| r.gyro_y),
            gyro_z: inertial.map(|r| r.gyro_z),
            pitch: inertial.map(|r| r.pitch),
            roll: inertial.map(|r| r.roll),
            mag_x: magnetic.map(|r| r.mag_x),
            mag_y: magnetic.map(|r| r.mag_y),
            mag_z: magnetic.map(|r| r.mag_z),
            heading: magnetic.map(|r| r.heading),
            battery_voltage: battery.map(|r| r.voltage),
            battery_percent: battery.map(|r| r.percent),
            wind_speed: wind.and_then(|r| r.speed),
            wind_angle: wind.and_then(|r| r.angle),
            wind_speed_knots: wind.and_then(|r| r.speed_knots),
            wind_true_direction: wind.and_then(|r| r.true_direction),
            link_connected: snapshot.link_connected,
            link_signal: snapshot.link_signal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::LinkReading;
    use serde_json::Value;

    fn tracking_snapshot() -> Snapshot {
        let fix = Fix {
            timestamp: Some("2002-12-09T08:35:59.00Z".to_string()),
            status: FixStatus::Fix,
            latitude: Some(47.2852395),
            longitude: Some(8.56525367),
            speed_over_ground: Some(3.2),
            ..Default::default()
        };
        let mut snapshot = Snapshot::new("boat1", true, fix);
        snapshot.apply(AuxReading::Battery(BatteryReading {
            voltage: 3.87,
            percent: 87.0,
        }));
        snapshot.apply(AuxReading::Link(LinkReading {
            connected: true,
            signal: Some(-40),
        }));
        snapshot
    }

    #[test]
    fn test_apply_readings() {
        let snapshot = tracking_snapshot();
        assert_eq!(snapshot.battery.unwrap().percent, 87.0);
        assert!(snapshot.link_connected);
        assert_eq!(snapshot.link_signal, Some(-40));
        assert!(snapshot.inertial.is_none());
        assert_eq!(snapshot.fix_status(), FixStatus::Fix);
    }

    #[test]
    fn test_record_flattens_blocks() {
        let record = LogRecord::from(&tracking_snapshot());
        assert_eq!(record.device_id.as_deref(), Some("boat1"));
        assert_eq!(record.fix_status.as_deref(), Some("A"));
        assert_eq!(record.battery_voltage, Some(3.87));
        assert_eq!(record.acc_x, None);
        assert_eq!(record.wind_speed, None);
        assert_eq!(record.link_signal, Some(-40));
    }

    #[test]
    fn test_empty_strings_become_absent() {
        let fix = Fix {
            timestamp: Some("  ".to_string()),
            ..Default::default()
        };
        let record = LogRecord::from(&Snapshot::new("", false, fix));
        assert_eq!(record.device_id, None);
        assert_eq!(record.timestamp, None);
        assert_eq!(record.fix_status.as_deref(), Some("V"));
    }

    #[test]
    fn test_absent_fields_serialize_as_null() {
        let json = serde_json::to_value(LogRecord::from(&tracking_snapshot())).unwrap();
        let object = json.as_object().unwrap();

        assert_eq!(object["latitude"], Value::from(47.2852395));
        assert_eq!(object["altitude"], Value::Null);
        assert_eq!(object["heading"], Value::Null);
        assert_eq!(object["valid_time"], Value::Bool(true));
        // Every column is present even when absent
        assert!(object.contains_key("wind_true_direction"));
        assert_eq!(object.len(), 32);
    }
}

//! # Auxiliary Sensors
//!
//! Everything besides the GNSS receiver that contributes to a snapshot.
//!
//! Each sensor sits behind [`AuxSensor`]. The device role is resolved once
//! at startup into a fixed list of boxed sensors that the fusion producer
//! iterates without knowing what is behind them.

pub mod battery;
pub mod iio;
pub mod link;
pub mod wind;

use serde::Serialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{Config, DeviceRole};
use crate::error::{Result, TrackerError};
use crate::serial::SensorSerial;

/// Sensor families a node can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    Inertial,
    Magnetic,
    Battery,
    Wind,
    Link,
}

/// Accelerometer (g), gyroscope (deg/s) and derived attitude (deg)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct InertialReading {
    pub acc_x: f64,
    pub acc_y: f64,
    pub acc_z: f64,
    pub gyro_x: f64,
    pub gyro_y: f64,
    pub gyro_z: f64,
    pub pitch: f64,
    pub roll: f64,
}

/// Magnetic field (µT) and compass heading (deg)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MagneticReading {
    pub mag_x: f64,
    pub mag_y: f64,
    pub mag_z: f64,
    pub heading: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BatteryReading {
    /// Volts
    pub voltage: f64,
    /// State of charge, 0-100
    pub percent: f64,
}

/// Apparent wind from the anemometer
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct WindReading {
    /// In the unit the sensor reports
    pub speed: Option<f64>,
    /// Relative to the bow, degrees
    pub angle: Option<f64>,
    /// Only when the sensor reports m/s
    pub speed_knots: Option<f64>,
    /// Filled in by fusion from the compass heading
    pub true_direction: Option<f64>,
}

/// Wireless link state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LinkReading {
    pub connected: bool,
    /// Signal level in dBm
    pub signal: Option<i32>,
}

/// One sample from any auxiliary sensor
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AuxReading {
    Inertial(InertialReading),
    Magnetic(MagneticReading),
    Battery(BatteryReading),
    Wind(WindReading),
    Link(LinkReading),
}

/// A sensor the fusion producer can sample
#[cfg_attr(test, mockall::automock)]
pub trait AuxSensor: Send {
    /// Which family this sensor belongs to
    fn kind(&self) -> SensorKind;

    /// Read current values
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::SensorUnavailable`] (or an I/O error) when no
    /// reading can be produced this cycle.
    fn sample(&mut self) -> Result<AuxReading>;
}

/// Sensors carried by each device role
pub fn role_sensors(role: DeviceRole) -> &'static [SensorKind] {
    match role {
        DeviceRole::Boat => &[
            SensorKind::Inertial,
            SensorKind::Magnetic,
            SensorKind::Battery,
            SensorKind::Link,
        ],
        DeviceRole::Buoy => &[SensorKind::Battery, SensorKind::Link],
        DeviceRole::Hub => &[SensorKind::Magnetic, SensorKind::Wind],
    }
}

/// Sensors resolved for this node, plus the wind reader task when the role
/// carries an anemometer
pub struct SensorSet {
    pub sensors: Vec<Box<dyn AuxSensor>>,
    pub wind_reader: Option<wind::WindReader>,
}

impl std::fmt::Debug for SensorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<SensorKind> = self.sensors.iter().map(|s| s.kind()).collect();
        f.debug_struct("SensorSet")
            .field("sensors", &kinds)
            .field("wind_reader", &self.wind_reader.is_some())
            .finish()
    }
}

/// Build the sensor list for the configured role
///
/// A sensor whose device cannot be opened is left out with a warning.
pub fn build_sensors(config: &Config) -> SensorSet {
    let paths = &config.sensors;
    let mut sensors: Vec<Box<dyn AuxSensor>> = Vec::new();
    let mut wind_reader = None;

    for kind in role_sensors(config.device.role) {
        match kind {
            SensorKind::Inertial => {
                sensors.push(Box::new(iio::InertialSensor::new(&paths.imu_dir)));
            }
            SensorKind::Magnetic => {
                sensors.push(Box::new(iio::MagneticSensor::new(&paths.mag_dir)));
            }
            SensorKind::Battery => {
                sensors.push(Box::new(battery::PowerSupplyBattery::new(&paths.battery_dir)));
            }
            SensorKind::Link => {
                sensors.push(Box::new(link::LinkMonitor::new(
                    &paths.net_class_dir,
                    &paths.wireless_stats_path,
                    &paths.link_interface,
                )));
            }
            SensorKind::Wind => match SensorSerial::open(&paths.wind_port, paths.wind_baud_rate) {
                Ok(serial) => {
                    let (reader, sensor) = wind::wind_channel(
                        serial,
                        Duration::from_millis(config.gps.read_timeout_ms),
                        wind::WIND_MAX_AGE,
                    );
                    sensors.push(Box::new(sensor));
                    wind_reader = Some(reader);
                }
                Err(e) => warn!("Wind sensor disabled: {}", e),
            },
        }
    }

    info!(
        "Active sensors for {:?}: {:?}",
        config.device.role,
        sensors.iter().map(|s| s.kind()).collect::<Vec<_>>()
    );

    SensorSet {
        sensors,
        wind_reader,
    }
}

/// Read a single numeric sysfs attribute
pub(crate) fn read_sysfs_f64(path: &Path) -> Result<f64> {
    let text = fs::read_to_string(path)?;
    text.trim().parse::<f64>().map_err(|_| {
        TrackerError::SensorUnavailable(format!(
            "{}: not a number: {:?}",
            path.display(),
            text.trim()
        ))
    })
}

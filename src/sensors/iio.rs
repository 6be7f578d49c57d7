//! # IIO Inertial and Magnetic Sensors
//!
//! Reads accelerometer, gyroscope and magnetometer channels from the Linux
//! Industrial I/O subsystem. Each channel value is `in_<type>_<axis>_raw`
//! multiplied by `in_<type>_scale`.

use std::path::{Path, PathBuf};

use super::{read_sysfs_f64, AuxReading, AuxSensor, InertialReading, MagneticReading, SensorKind};
use crate::error::Result;
use crate::geo::{round_to, wrap_degrees};

/// Standard gravity in m/s²
const STANDARD_GRAVITY: f64 = 9.80665;

/// IIO reports magnetic fields in gauss
const MICROTESLA_PER_GAUSS: f64 = 100.0;

fn read_axes(dir: &Path, channel: &str) -> Result<(f64, f64, f64)> {
    let scale = read_sysfs_f64(&dir.join(format!("in_{}_scale", channel)))?;
    let axis = |name: &str| -> Result<f64> {
        Ok(read_sysfs_f64(&dir.join(format!("in_{}_{}_raw", channel, name)))? * scale)
    };
    Ok((axis("x")?, axis("y")?, axis("z")?))
}

/// Pitch and roll in degrees from an accelerometer vector
pub fn attitude(acc_x: f64, acc_y: f64, acc_z: f64) -> (f64, f64) {
    let pitch = acc_y.atan2((acc_x * acc_x + acc_z * acc_z).sqrt()).to_degrees();
    let roll = (-acc_x).atan2(acc_z).to_degrees();
    (round_to(pitch, 2), round_to(roll, 2))
}

/// Compass heading in degrees from the horizontal field components
///
/// Measured from the positive x axis toward the positive y axis.
///
/// # Examples
///
/// ```
/// use tracker_node::sensors::iio::compass_heading;
///
/// assert_eq!(compass_heading(0.0, 20.0), 0.0);
/// assert_eq!(compass_heading(-20.0, 0.0), 90.0);
/// assert_eq!(compass_heading(20.0, 0.0), 270.0);
/// ```
pub fn compass_heading(mag_x: f64, mag_y: f64) -> f64 {
    wrap_degrees(round_to((-mag_x).atan2(mag_y).to_degrees(), 2))
}

/// Six-axis IMU exposed as an IIO device
#[derive(Debug, Clone)]
pub struct InertialSensor {
    dir: PathBuf,
}

impl InertialSensor {
    pub fn new(dir: &str) -> Self {
        Self {
            dir: PathBuf::from(dir),
        }
    }
}

impl AuxSensor for InertialSensor {
    fn kind(&self) -> SensorKind {
        SensorKind::Inertial
    }

    fn sample(&mut self) -> Result<AuxReading> {
        let (ax, ay, az) = read_axes(&self.dir, "accel")?;
        let (gx, gy, gz) = read_axes(&self.dir, "anglvel")?;

        let acc = |v: f64| round_to(v / STANDARD_GRAVITY, 2);
        let gyro = |v: f64| round_to(v.to_degrees(), 2);
        let (acc_x, acc_y, acc_z) = (acc(ax), acc(ay), acc(az));
        let (pitch, roll) = attitude(acc_x, acc_y, acc_z);

        Ok(AuxReading::Inertial(InertialReading {
            acc_x,
            acc_y,
            acc_z,
            gyro_x: gyro(gx),
            gyro_y: gyro(gy),
            gyro_z: gyro(gz),
            pitch,
            roll,
        }))
    }
}

/// Three-axis magnetometer exposed as an IIO device
#[derive(Debug, Clone)]
pub struct MagneticSensor {
    dir: PathBuf,
}

impl MagneticSensor {
    pub fn new(dir: &str) -> Self {
        Self {
            dir: PathBuf::from(dir),
        }
    }
}

impl AuxSensor for MagneticSensor {
    fn kind(&self) -> SensorKind {
        SensorKind::Magnetic
    }

    fn sample(&mut self) -> Result<AuxReading> {
        let (x, y, z) = read_axes(&self.dir, "magn")?;
        let ut = |v: f64| round_to(v * MICROTESLA_PER_GAUSS, 2);
        let (mag_x, mag_y, mag_z) = (ut(x), ut(y), ut(z));

        Ok(AuxReading::Magnetic(MagneticReading {
            mag_x,
            mag_y,
            mag_z,
            heading: compass_heading(mag_x, mag_y),
        }))
    }
}

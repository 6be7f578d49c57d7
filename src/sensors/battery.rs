//! Fuel gauge read through the Linux power-supply class

use std::path::PathBuf;

use super::{read_sysfs_f64, AuxReading, AuxSensor, BatteryReading, SensorKind};
use crate::error::Result;
use crate::geo::round_to;

const MICROVOLTS_PER_VOLT: f64 = 1_000_000.0;

/// Battery behind `/sys/class/power_supply/<name>`
#[derive(Debug, Clone)]
pub struct PowerSupplyBattery {
    dir: PathBuf,
}

impl PowerSupplyBattery {
    pub fn new(dir: &str) -> Self {
        Self {
            dir: PathBuf::from(dir),
        }
    }
}

impl AuxSensor for PowerSupplyBattery {
    fn kind(&self) -> SensorKind {
        SensorKind::Battery
    }

    fn sample(&mut self) -> Result<AuxReading> {
        let microvolts = read_sysfs_f64(&self.dir.join("voltage_now"))?;
        let capacity = read_sysfs_f64(&self.dir.join("capacity"))?;

        Ok(AuxReading::Battery(BatteryReading {
            voltage: round_to(microvolts / MICROVOLTS_PER_VOLT, 2),
            percent: round_to(capacity.clamp(0.0, 100.0), 1),
        }))
    }
}

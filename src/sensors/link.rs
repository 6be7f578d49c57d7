//! Wireless link monitor backed by `/sys/class/net` and `/proc/net/wireless`

use std::fs;
use std::path::PathBuf;

use super::{AuxReading, AuxSensor, LinkReading, SensorKind};
use crate::error::Result;

/// Reports whether the interface is up and its signal level
#[derive(Debug, Clone)]
pub struct LinkMonitor {
    operstate_path: PathBuf,
    wireless_path: PathBuf,
    interface: String,
}

impl LinkMonitor {
    pub fn new(net_class_dir: &str, wireless_stats_path: &str, interface: &str) -> Self {
        Self {
            operstate_path: PathBuf::from(net_class_dir).join(interface).join("operstate"),
            wireless_path: PathBuf::from(wireless_stats_path),
            interface: interface.to_string(),
        }
    }

    fn read_signal(&self) -> Option<i32> {
        let stats = fs::read_to_string(&self.wireless_path).ok()?;
        parse_signal_level(&stats, &self.interface)
    }
}

/// Extract the signal level (dBm) for `interface` from `/proc/net/wireless`
///
/// ```text
/// Inter-| sta-|   Quality        |   Discarded packets
///  face | tus | link level noise |  nwid  crypt   frag
///  wlan0: 0000   70.  -40.  -256        0      0      0
/// ```
pub fn parse_signal_level(stats: &str, interface: &str) -> Option<i32> {
    let prefix = format!("{}:", interface);
    stats
        .lines()
        .skip(2)
        .map(str::split_whitespace)
        .filter_map(|mut parts| match parts.next() {
            Some(name) if name == prefix => parts.nth(2),
            _ => None,
        })
        .find_map(|level| level.trim_end_matches('.').parse::<f64>().ok())
        .map(|level| level as i32)
}

impl AuxSensor for LinkMonitor {
    fn kind(&self) -> SensorKind {
        SensorKind::Link
    }

    fn sample(&mut self) -> Result<AuxReading> {
        let connected = fs::read_to_string(&self.operstate_path)?.trim() == "up";
        let signal = if connected { self.read_signal() } else { None };
        Ok(AuxReading::Link(LinkReading { connected, signal }))
    }
}

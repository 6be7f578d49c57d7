//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, TrackerError};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    pub device: DeviceConfig,
    pub gps: GpsConfig,
    #[serde(default)]
    pub fusion: FusionConfig,
    pub transport: TransportConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub indicator: IndicatorConfig,
    #[serde(default)]
    pub sensors: SensorsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Kind of tracking unit this node runs on.
///
/// The role selects the auxiliary sensor set and prefixes every transport
/// topic (`boatlive`, `buoycontrol`, `hubstatus`, ...).
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceRole {
    #[default]
    Boat,
    Buoy,
    Hub,
}

impl DeviceRole {
    /// Topic prefix for this role.
    pub fn topic_prefix(&self) -> &'static str {
        match self {
            DeviceRole::Boat => "boat",
            DeviceRole::Buoy => "buoy",
            DeviceRole::Hub => "hub",
        }
    }
}

/// Device identity
#[derive(Debug, Deserialize, Clone)]
pub struct DeviceConfig {
    #[serde(default = "default_identifier")]
    pub identifier: String,

    #[serde(default)]
    pub role: DeviceRole,
}

/// GNSS receiver configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GpsConfig {
    #[serde(default = "default_gps_port")]
    pub port: String,

    #[serde(default = "default_gps_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_update_rate_hz")]
    pub update_rate_hz: u32,

    #[serde(default = "default_max_speed_knots")]
    pub max_speed_knots: f64,

    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

/// Snapshot production cadence
#[derive(Debug, Deserialize, Clone)]
pub struct FusionConfig {
    #[serde(default = "default_interim_rate_hz")]
    pub interim_rate_hz: f64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_battery_interval_ms")]
    pub battery_interval_ms: u64,
}

/// Publish/subscribe transport configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TransportConfig {
    #[serde(default = "default_broker")]
    pub broker: String,

    #[serde(default = "default_broker_port")]
    pub port: u16,

    #[serde(default = "default_live_interval_ms")]
    pub live_interval_ms: u64,

    #[serde(default = "default_status_interval_ms")]
    pub status_interval_ms: u64,

    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    #[serde(default = "default_keep_alive_s")]
    pub keep_alive_s: u64,
}

/// Persistent log configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_erase_poll_ms")]
    pub erase_poll_ms: u64,
}

/// Status indicator configuration
#[derive(Debug, Deserialize, Clone)]
pub struct IndicatorConfig {
    #[serde(default = "default_cycle_ms")]
    pub cycle_ms: u64,
}

/// Locations of the auxiliary sensor interfaces
#[derive(Debug, Deserialize, Clone)]
pub struct SensorsConfig {
    #[serde(default = "default_link_interface")]
    pub link_interface: String,

    #[serde(default = "default_net_class_dir")]
    pub net_class_dir: String,

    #[serde(default = "default_wireless_stats_path")]
    pub wireless_stats_path: String,

    #[serde(default = "default_battery_dir")]
    pub battery_dir: String,

    #[serde(default = "default_imu_dir")]
    pub imu_dir: String,

    #[serde(default = "default_mag_dir")]
    pub mag_dir: String,

    #[serde(default = "default_wind_port")]
    pub wind_port: String,

    #[serde(default = "default_wind_baud_rate")]
    pub wind_baud_rate: u32,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily rolling log files. Console only when unset.
    #[serde(default)]
    pub dir: Option<String>,
}

// Default value functions
fn default_identifier() -> String { "boat1".to_string() }

fn default_gps_port() -> String { "/dev/serial0".to_string() }
fn default_gps_baud_rate() -> u32 { 38400 }
fn default_update_rate_hz() -> u32 { 10 }
fn default_max_speed_knots() -> f64 { 25.0 }
fn default_read_timeout_ms() -> u64 { 100 }

fn default_interim_rate_hz() -> f64 { 10.0 }
fn default_poll_interval_ms() -> u64 { 5 }
fn default_battery_interval_ms() -> u64 { 2000 }

fn default_broker() -> String { "hub.local".to_string() }
fn default_broker_port() -> u16 { 1883 }
fn default_live_interval_ms() -> u64 { 100 }
fn default_status_interval_ms() -> u64 { 2000 }
fn default_reconnect_delay_ms() -> u64 { 5000 }
fn default_keep_alive_s() -> u64 { 60 }

fn default_data_dir() -> String { "./data".to_string() }
fn default_queue_capacity() -> usize { 512 }
fn default_erase_poll_ms() -> u64 { 1000 }

fn default_cycle_ms() -> u64 { 500 }

fn default_link_interface() -> String { "wlan0".to_string() }
fn default_net_class_dir() -> String { "/sys/class/net".to_string() }
fn default_wireless_stats_path() -> String { "/proc/net/wireless".to_string() }
fn default_battery_dir() -> String { "/sys/class/power_supply/max170xx_battery".to_string() }
fn default_imu_dir() -> String { "/sys/bus/iio/devices/iio:device0".to_string() }
fn default_mag_dir() -> String { "/sys/bus/iio/devices/iio:device1".to_string() }
fn default_wind_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_wind_baud_rate() -> u32 { 38400 }

fn default_log_level() -> String { "info".to_string() }

impl Default for DeviceConfig {
    fn default() -> Self {
        Self { identifier: default_identifier(), role: DeviceRole::default() }
    }
}

impl Default for GpsConfig {
    fn default() -> Self {
        Self {
            port: default_gps_port(),
            baud_rate: default_gps_baud_rate(),
            update_rate_hz: default_update_rate_hz(),
            max_speed_knots: default_max_speed_knots(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            interim_rate_hz: default_interim_rate_hz(),
            poll_interval_ms: default_poll_interval_ms(),
            battery_interval_ms: default_battery_interval_ms(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            broker: default_broker(),
            port: default_broker_port(),
            live_interval_ms: default_live_interval_ms(),
            status_interval_ms: default_status_interval_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            keep_alive_s: default_keep_alive_s(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            queue_capacity: default_queue_capacity(),
            erase_poll_ms: default_erase_poll_ms(),
        }
    }
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self { cycle_ms: default_cycle_ms() }
    }
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            link_interface: default_link_interface(),
            net_class_dir: default_net_class_dir(),
            wireless_stats_path: default_wireless_stats_path(),
            battery_dir: default_battery_dir(),
            imu_dir: default_imu_dir(),
            mag_dir: default_mag_dir(),
            wind_port: default_wind_port(),
            wind_baud_rate: default_wind_baud_rate(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), dir: None }
    }
}

impl FusionConfig {
    /// Time between interim snapshots while the receiver has no clock.
    pub fn interim_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.interim_rate_hz)
    }
}

impl TransportConfig {
    /// Client identifier presented to the broker.
    pub fn client_id(&self, identifier: &str) -> String {
        format!("{}_{}", identifier, std::process::id())
    }
}

impl StorageConfig {
    /// Path of the SQLite log file for a device.
    pub fn db_path(&self, identifier: &str) -> PathBuf {
        Path::new(&self.data_dir).join(format!("datalog_{}.db", identifier))
    }
}

fn invalid(message: impl std::fmt::Display) -> TrackerError {
    TrackerError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails (including an unknown device role)
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tracker_node::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// An unsupported GNSS update rate is not an error here; it is
    /// downgraded to the nearest supported rate when the receiver is
    /// configured.
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.device.identifier.trim().is_empty() {
            return Err(invalid("device identifier cannot be empty"));
        }

        if self.gps.port.is_empty() {
            return Err(invalid("gps port cannot be empty"));
        }

        if !crate::serial::SUPPORTED_BAUD_RATES.contains(&self.gps.baud_rate) {
            return Err(invalid("gps baud_rate must be one of: 9600, 38400, 115200"));
        }

        if self.gps.update_rate_hz == 0 {
            return Err(invalid("gps update_rate_hz must be greater than 0"));
        }

        if !(self.gps.max_speed_knots > 0.0 && self.gps.max_speed_knots <= 100.0) {
            return Err(invalid("max_speed_knots must be between 0 (exclusive) and 100"));
        }

        if self.gps.read_timeout_ms == 0 || self.gps.read_timeout_ms > 10000 {
            return Err(invalid("read_timeout_ms must be between 1 and 10000"));
        }

        if !(self.fusion.interim_rate_hz > 0.0 && self.fusion.interim_rate_hz <= 50.0) {
            return Err(invalid("interim_rate_hz must be between 0 (exclusive) and 50"));
        }

        if self.fusion.poll_interval_ms == 0 || self.fusion.poll_interval_ms > 100 {
            return Err(invalid("poll_interval_ms must be between 1 and 100"));
        }

        if self.fusion.battery_interval_ms == 0 || self.fusion.battery_interval_ms > 60000 {
            return Err(invalid("battery_interval_ms must be between 1 and 60000"));
        }

        if self.transport.broker.is_empty() {
            return Err(invalid("transport broker cannot be empty"));
        }

        if self.transport.live_interval_ms < 100 || self.transport.live_interval_ms > 1000 {
            return Err(invalid("live_interval_ms must be between 100 and 1000"));
        }

        if self.transport.status_interval_ms == 0 || self.transport.status_interval_ms > 60000 {
            return Err(invalid("status_interval_ms must be between 1 and 60000"));
        }

        if self.transport.reconnect_delay_ms == 0 || self.transport.reconnect_delay_ms > 60000 {
            return Err(invalid("reconnect_delay_ms must be between 1 and 60000"));
        }

        if self.transport.keep_alive_s < 5 {
            return Err(invalid("keep_alive_s must be at least 5"));
        }

        if self.storage.data_dir.is_empty() {
            return Err(invalid("storage data_dir cannot be empty"));
        }

        if self.storage.queue_capacity == 0 || self.storage.queue_capacity > 4096 {
            return Err(invalid("queue_capacity must be between 1 and 4096"));
        }

        if self.storage.erase_poll_ms == 0 || self.storage.erase_poll_ms > 60000 {
            return Err(invalid("erase_poll_ms must be between 1 and 60000"));
        }

        if self.indicator.cycle_ms == 0 || self.indicator.cycle_ms > 10000 {
            return Err(invalid("indicator cycle_ms must be between 1 and 10000"));
        }

        if self.sensors.link_interface.is_empty() {
            return Err(invalid("link_interface cannot be empty"));
        }

        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(invalid(format!("unknown log level '{}'", self.logging.level)));
        }

        Ok(())
    }
}

//! # Serial Communication Module
//!
//! Serial links to the GNSS receiver and the NMEA wind sensor.
//!
//! This module handles:
//! - Opening a serial port at the configured baud rate (8N1, no flow control)
//! - Reads bounded by a per-call timeout
//! - Writing configuration frames to the receiver

pub mod port_trait;

use crate::error::{Result, TrackerError};
use port_trait::{SerialPortIO, TokioSerialPort};
use std::time::Duration;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info};

/// Baud rates the GNSS receiver UART can be configured for
pub const SUPPORTED_BAUD_RATES: &[u32] = &[9600, 38400, 115200];

/// Sensor Serial Port Handler
///
/// Owns one serial line to an NMEA-speaking peripheral.
pub struct SensorSerial {
    port: Box<dyn SerialPortIO>,
    device_path: String,
}

impl std::fmt::Debug for SensorSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorSerial")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl SensorSerial {
    /// Open a serial peripheral
    ///
    /// # Arguments
    ///
    /// * `path` - Device path (e.g., "/dev/serial0")
    /// * `baud_rate` - Line speed
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Serial`] if the port cannot be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tracker_node::serial::SensorSerial;
    ///
    /// let serial = SensorSerial::open("/dev/serial0", 38400)?;
    /// println!("Connected to: {}", serial.device_path());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        debug!("Opening serial port {} at {} baud", path, baud_rate);
        let port = Self::open_port(path, baud_rate)?;
        info!("Opened serial device at {}", path);
        Ok(Self::from_port(Box::new(TokioSerialPort::new(port)), path))
    }

    /// Wrap an already opened port
    pub fn from_port(port: Box<dyn SerialPortIO>, device_path: &str) -> Self {
        Self {
            port,
            device_path: device_path.to_string(),
        }
    }

    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| TrackerError::Serial(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }

    /// Write a complete frame and flush it
    ///
    /// # Arguments
    ///
    /// * `packet` - Raw bytes, e.g. a UBX configuration frame
    pub async fn send_packet(&mut self, packet: &[u8]) -> Result<()> {
        self.port
            .write_all(packet)
            .await
            .map_err(|e| TrackerError::Serial(format!("Failed to write packet: {}", e)))?;

        self.port
            .flush()
            .await
            .map_err(|e| TrackerError::Serial(format!("Failed to flush serial port: {}", e)))?;

        debug!("Sent {} bytes to {}", packet.len(), self.device_path);
        Ok(())
    }

    /// Read the next chunk of bytes
    ///
    /// # Returns
    ///
    /// Number of bytes placed in `buf`. Zero when nothing arrived within
    /// `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Serial`] on an I/O failure
    pub async fn read_chunk(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        match tokio::time::timeout(timeout, self.port.read(buf)).await {
            Ok(Ok(n)) => Ok(n),
            Ok(Err(e)) => Err(TrackerError::Serial(format!(
                "Failed to read from {}: {}",
                self.device_path, e
            ))),
            Err(_) => Ok(0),
        }
    }

    /// Get the device path of the opened serial port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}

//! # Error Types
//!
//! Custom error types for the tracker node using `thiserror`.

use thiserror::Error;

/// Main error type for the tracker node
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// NMEA sentence errors
    #[error("NMEA error: {0}")]
    Nmea(String),

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// JSON encoding/decoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Persistent store errors
    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// Publish/subscribe transport errors
    #[error("Transport error: {0}")]
    Transport(String),

    /// An auxiliary sensor has no reading to offer
    #[error("Sensor unavailable: {0}")]
    SensorUnavailable(String),
}

/// Result type alias for the tracker node
pub type Result<T> = std::result::Result<T, TrackerError>;

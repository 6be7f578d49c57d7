//! # Tracker Node Library
//!
//! Field telemetry for boat, buoy and hub tracking units.
//!
//! GNSS position is parsed and validated, fused with role-specific
//! auxiliary sensors into snapshots, streamed over MQTT, logged to SQLite,
//! and summarized on a status indicator. Operators toggle streaming and
//! logging and request log erasure through the control topic.

pub mod config;
pub mod control;
pub mod error;
pub mod geo;
pub mod indicator;
pub mod nmea;
pub mod node;
pub mod position;
pub mod sensors;
pub mod serial;
pub mod storage;
pub mod telemetry;

//! # Telemetry Module
//!
//! The snapshot pipeline between the position parser and the outputs.
//!
//! This module handles:
//! - Fusing the latest fix with auxiliary readings ([`fusion`])
//! - The latest-wins producer/consumer handoff ([`handoff`])
//! - The snapshot and flat log record types ([`snapshot`])

pub mod fusion;
pub mod handoff;
pub mod snapshot;

pub use snapshot::{LogRecord, Snapshot};

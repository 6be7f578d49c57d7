//! # NMEA Protocol Module
//!
//! NMEA 0183 sentence handling for the GNSS receiver and the wind sensor.
//!
//! This module handles:
//! - Reassembling a raw byte stream into text sentences
//! - `*hh` checksum validation
//! - Decoding RMC, GGA and MWV sentences
//! - UBX configuration commands for the u-blox receiver

pub mod protocol;
pub mod checksum;
pub mod framer;
pub mod decoder;
pub mod ubx;

//! # UBX Configuration Frames
//!
//! Builds the binary `CFG-VALSET` frame that sets the receiver's measurement
//! rate. Frame layout:
//!
//! ```text
//! [0xB5 0x62] [class] [id] [len: u16 LE] [payload] [ck_a] [ck_b]
//! ```

use bytes::{BufMut, BytesMut};
use tracing::warn;

/// UBX sync characters
pub const UBX_SYNC: [u8; 2] = [0xB5, 0x62];

/// Configuration message class
pub const CLASS_CFG: u8 = 0x06;

/// Set configuration values
pub const ID_VALSET: u8 = 0x8A;

/// `CFG-RATE-MEAS` key, nominal time between measurements in ms (U2)
pub const CFG_RATE_MEAS_KEY: u32 = 0x3021_0001;

/// Apply to the RAM layer only
const LAYER_RAM: u8 = 0x01;

const VALSET_VERSION: u8 = 0x01;

/// Update rates the receiver accepts, in Hz
pub const SUPPORTED_RATES_HZ: &[u32] = &[1, 2, 5, 10, 15, 20, 25];

/// Closest supported rate, ties resolve to the lower one
///
/// # Examples
///
/// ```
/// use tracker_node::nmea::ubx::nearest_supported_rate;
///
/// assert_eq!(nearest_supported_rate(10), 10);
/// assert_eq!(nearest_supported_rate(12), 10);
/// assert_eq!(nearest_supported_rate(100), 25);
/// ```
pub fn nearest_supported_rate(rate_hz: u32) -> u32 {
    SUPPORTED_RATES_HZ
        .iter()
        .copied()
        .min_by_key(|&supported| (supported.abs_diff(rate_hz), supported))
        .unwrap_or(1)
}

/// 8-bit Fletcher checksum over class, id, length and payload
pub fn ubx_checksum(data: &[u8]) -> (u8, u8) {
    data.iter().fold((0u8, 0u8), |(a, b), &byte| {
        let a = a.wrapping_add(byte);
        (a, b.wrapping_add(a))
    })
}

/// Encode a complete UBX frame
pub fn encode_frame(class: u8, id: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = BytesMut::with_capacity(payload.len() + 8);
    frame.put_slice(&UBX_SYNC);
    frame.put_u8(class);
    frame.put_u8(id);
    frame.put_u16_le(payload.len() as u16);
    frame.put_slice(payload);

    let (ck_a, ck_b) = ubx_checksum(&frame[2..]);
    frame.put_u8(ck_a);
    frame.put_u8(ck_b);
    frame.to_vec()
}

/// Encode the measurement rate command
///
/// Unsupported rates are replaced by the nearest supported one.
///
/// # Arguments
///
/// * `rate_hz` - Requested navigation update rate
///
/// # Returns
///
/// The effective rate together with the frame bytes.
pub fn encode_rate_command(rate_hz: u32) -> (u32, Vec<u8>) {
    let effective = nearest_supported_rate(rate_hz);
    if effective != rate_hz {
        warn!(
            "Update rate {} Hz not supported, using {} Hz",
            rate_hz, effective
        );
    }

    let period_ms = (1000 / effective) as u16;

    let mut payload = BytesMut::with_capacity(10);
    payload.put_u8(VALSET_VERSION);
    payload.put_u8(LAYER_RAM);
    payload.put_u16_le(0);
    payload.put_u32_le(CFG_RATE_MEAS_KEY);
    payload.put_u16_le(period_ms);

    (effective, encode_frame(CLASS_CFG, ID_VALSET, &payload))
}

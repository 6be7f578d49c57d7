//! # NMEA Checksum
//!
//! XOR checksum over every character between the leading `$` and the `*`
//! delimiter, transmitted as two hex digits.

use super::protocol::{CHECKSUM_DELIMITER, SENTENCE_START};

/// Calculate the NMEA checksum of a sentence body (without `$` and `*hh`)
///
/// # Examples
///
/// ```
/// use tracker_node::nmea::checksum::nmea_checksum;
///
/// assert_eq!(nmea_checksum("IIMWV,045.0,R,5.2,M,A"), 0x38);
/// ```
pub fn nmea_checksum(body: &str) -> u8 {
    body.bytes().fold(0, |acc, byte| acc ^ byte)
}

/// Check the trailing `*hh` checksum of a complete sentence
///
/// Returns `false` when the sentence does not start with `$`, has no `*`,
/// carries fewer than two hex digits, or the value does not match.
pub fn verify_checksum(sentence: &str) -> bool {
    let Some(rest) = sentence.strip_prefix(SENTENCE_START) else {
        return false;
    };
    let Some((body, tail)) = rest.split_once(CHECKSUM_DELIMITER) else {
        return false;
    };
    let Some(hex) = tail.get(..2) else {
        return false;
    };
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return false;
    }

    match u8::from_str_radix(hex, 16) {
        Ok(expected) => nmea_checksum(body) == expected,
        Err(_) => false,
    }
}

/// Build a complete sentence from its body
///
/// # Examples
///
/// ```
/// use tracker_node::nmea::checksum::with_checksum;
///
/// assert_eq!(with_checksum("IIMWV,045.0,R,5.2,M,A"), "$IIMWV,045.0,R,5.2,M,A*38");
/// ```
pub fn with_checksum(body: &str) -> String {
    format!("{}{}{}{:02X}", SENTENCE_START, body, CHECKSUM_DELIMITER, nmea_checksum(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_rmc_vector() {
        let line = "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A";
        assert!(verify_checksum(line));
    }

    #[test]
    fn test_known_gga_vector() {
        let line = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47";
        assert!(verify_checksum(line));
    }

    #[test]
    fn test_lowercase_hex_accepted() {
        let line = "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6a";
        assert!(verify_checksum(line));
    }

    #[test]
    fn test_corrupted_body_rejected() {
        let line = "$GPRMC,123519,A,4807.039,N,01131.000,E,022.4,084.4,230394,003.1,W*6A";
        assert!(!verify_checksum(line));
    }

    #[test]
    fn test_corrupted_checksum_rejected() {
        let line = "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6B";
        assert!(!verify_checksum(line));
    }

    #[test]
    fn test_missing_parts_rejected() {
        assert!(!verify_checksum("GPRMC,123519*6A"));
        assert!(!verify_checksum("$GPRMC,123519"));
        assert!(!verify_checksum("$GPRMC,123519*6"));
        assert!(!verify_checksum("$GPRMC,123519*ZZ"));
        assert!(!verify_checksum(""));
    }

    #[test]
    fn test_with_checksum_verifies() {
        let line = with_checksum("GNRMC,083559.10,V,,,,,,,091202,,,N");
        assert_eq!(line, "$GNRMC,083559.10,V,,,,,,,091202,,,N*68");
        assert!(verify_checksum(&line));
    }

    #[test]
    fn test_checksum_changes_with_data() {
        assert_ne!(nmea_checksum("GNGGA,1"), nmea_checksum("GNGGA,2"));
    }
}

//! # NMEA Protocol Constants and Types
//!
//! Core definitions shared by the sentence decoder and the position parser.

use serde::Serialize;

/// Leading marker of every sentence
pub const SENTENCE_START: char = '$';

/// Separates the sentence body from its checksum
pub const CHECKSUM_DELIMITER: char = '*';

/// Talker prefixes accepted from the GNSS receiver (multi-GNSS, GPS, Galileo)
pub const GNSS_TALKERS: &[&str] = &["$GN", "$GP", "$GA"];

/// Recommended minimum data (date, time, status, position, SOG/COG)
pub const SENTENCE_RMC: &str = "RMC";

/// Fix data (quality, satellites, HDOP, altitude)
pub const SENTENCE_GGA: &str = "GGA";

/// Wind speed and angle
pub const SENTENCE_MWV: &str = "MWV";

/// Degree digits of a latitude field (`ddmm.mmmm`)
pub const LAT_DEGREE_DIGITS: usize = 2;

/// Degree digits of a longitude field (`dddmm.mmmm`)
pub const LON_DEGREE_DIGITS: usize = 3;

/// Decimal places kept for decoded coordinates
pub const COORDINATE_DECIMALS: i32 = 8;

/// Receiver position status from the RMC status field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum FixStatus {
    /// `V` - receiver warning, no usable position
    #[default]
    #[serde(rename = "V")]
    NoFix,

    /// `A` - data valid
    #[serde(rename = "A")]
    Fix,
}

impl FixStatus {
    /// Interpret an RMC status field. Anything but `A` is treated as no fix.
    pub fn from_field(field: &str) -> Self {
        if field == "A" {
            FixStatus::Fix
        } else {
            FixStatus::NoFix
        }
    }

    /// Wire representation (`A` / `V`)
    pub fn as_str(&self) -> &'static str {
        match self {
            FixStatus::NoFix => "V",
            FixStatus::Fix => "A",
        }
    }
}

/// Latest resolved positioning reading
///
/// Latitude and longitude are only present while `status` is
/// [`FixStatus::Fix`] and the position passed jump rejection.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Fix {
    /// UTC time as `YYYY-MM-DDThh:mm:ss.ssZ`
    pub timestamp: Option<String>,
    #[serde(rename = "fix_status")]
    pub status: FixStatus,
    /// Decimal degrees, negative south
    pub latitude: Option<f64>,
    /// Decimal degrees, negative west
    pub longitude: Option<f64>,
    /// Knots
    pub speed_over_ground: Option<f64>,
    /// Degrees true
    pub course_over_ground: Option<f64>,
    pub fix_quality: Option<u8>,
    pub satellite_count: Option<u8>,
    pub horizontal_dilution: Option<f64>,
    /// Metres above mean sea level
    pub altitude: Option<f64>,
}

/// Decoded RMC sentence
#[derive(Debug, Clone, PartialEq)]
pub struct RmcSentence {
    pub timestamp: Option<String>,
    pub status: FixStatus,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub speed_over_ground: Option<f64>,
    pub course_over_ground: Option<f64>,
}

/// Decoded GGA sentence
#[derive(Debug, Clone, PartialEq)]
pub struct GgaSentence {
    pub fix_quality: Option<u8>,
    pub satellite_count: Option<u8>,
    pub horizontal_dilution: Option<f64>,
    pub altitude: Option<f64>,
}

/// Decoded MWV sentence
#[derive(Debug, Clone, PartialEq)]
pub struct MwvSentence {
    /// Wind angle in degrees, relative to the bow
    pub angle: Option<f64>,
    pub speed: Option<f64>,
    /// `N` knots, `M` m/s, `K` km/h
    pub unit: String,
    /// `A` valid, `V` invalid
    pub valid: bool,
}

/// Any sentence this node understands
#[derive(Debug, Clone, PartialEq)]
pub enum Sentence {
    Rmc(RmcSentence),
    Gga(GgaSentence),
    Mwv(MwvSentence),
}

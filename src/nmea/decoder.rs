//! # NMEA Sentence Decoder
//!
//! Decodes checksummed sentences into typed values. Malformed numeric fields
//! decode to `None` instead of failing the whole sentence.

use chrono::{NaiveDate, NaiveTime};

use super::checksum::verify_checksum;
use super::protocol::*;
use crate::error::{Result, TrackerError};
use crate::geo::round_to;

/// Decode a complete sentence
///
/// # Arguments
///
/// * `line` - One framed sentence including `$` and `*hh`
///
/// # Errors
///
/// Returns error if:
/// - The checksum is missing or wrong
/// - The sentence id is not RMC, GGA or MWV
pub fn decode_sentence(line: &str) -> Result<Sentence> {
    if !verify_checksum(line) {
        return Err(TrackerError::Nmea(format!("Checksum mismatch: {}", line)));
    }

    // verify_checksum guarantees both markers are present
    let body = line[1..].split(CHECKSUM_DELIMITER).next().unwrap_or_default();
    let fields: Vec<&str> = body.split(',').collect();

    let sentence_id = fields[0].get(2..).unwrap_or_default();
    match sentence_id {
        SENTENCE_RMC => Ok(Sentence::Rmc(decode_rmc(&fields))),
        SENTENCE_GGA => Ok(Sentence::Gga(decode_gga(&fields))),
        SENTENCE_MWV => Ok(Sentence::Mwv(decode_mwv(&fields))),
        other => Err(TrackerError::Nmea(format!("Unsupported sentence: {}", other))),
    }
}

/// `$--RMC,hhmmss.ss,A,llll.ll,a,yyyyy.yy,a,x.x,x.x,ddmmyy,...`
fn decode_rmc(fields: &[&str]) -> RmcSentence {
    let field = |i: usize| fields.get(i).copied().unwrap_or_default();

    RmcSentence {
        timestamp: compose_datetime(field(9), field(1)),
        status: FixStatus::from_field(field(2)),
        latitude: to_decimal(field(3), field(4), LAT_DEGREE_DIGITS),
        longitude: to_decimal(field(5), field(6), LON_DEGREE_DIGITS),
        speed_over_ground: parse_f64(field(7)),
        course_over_ground: parse_f64(field(8)),
    }
}

/// `$--GGA,hhmmss.ss,llll.ll,a,yyyyy.yy,a,q,nn,h.h,alt,M,...`
fn decode_gga(fields: &[&str]) -> GgaSentence {
    let field = |i: usize| fields.get(i).copied().unwrap_or_default();

    GgaSentence {
        fix_quality: parse_digits(field(6)),
        satellite_count: parse_digits(field(7)),
        horizontal_dilution: parse_f64(field(8)),
        altitude: parse_f64(field(9)),
    }
}

/// `$--MWV,angle,R,speed,unit,A/V`; the angle is relative to the bow
fn decode_mwv(fields: &[&str]) -> MwvSentence {
    let field = |i: usize| fields.get(i).copied().unwrap_or_default();

    MwvSentence {
        angle: parse_f64(field(1)),
        speed: parse_f64(field(3)),
        unit: field(4).to_uppercase(),
        valid: field(5) == "A",
    }
}

fn parse_f64(field: &str) -> Option<f64> {
    if field.is_empty() {
        return None;
    }
    field.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_digits(field: &str) -> Option<u8> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

/// Convert an NMEA `(d)ddmm.mmmm` coordinate to decimal degrees
///
/// Non-numeric characters are stripped first. The value is negated for the
/// `S` and `W` hemispheres and rounded to 8 decimal places.
///
/// # Arguments
///
/// * `value` - Coordinate field, e.g. `"4807.038"`
/// * `hemisphere` - `N`, `S`, `E` or `W`
/// * `degree_digits` - 2 for latitude, 3 for longitude
///
/// # Examples
///
/// ```
/// use tracker_node::nmea::decoder::to_decimal;
///
/// let lat = to_decimal("4807.038", "N", 2).unwrap();
/// assert!((lat - 48.1173).abs() < 1e-9);
/// assert_eq!(to_decimal("", "N", 2), None);
/// ```
pub fn to_decimal(value: &str, hemisphere: &str, degree_digits: usize) -> Option<f64> {
    let digits: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if digits.len() <= degree_digits {
        return None;
    }

    let degrees: u32 = digits[..degree_digits].parse().ok()?;
    let minutes: f64 = digits[degree_digits..].parse().ok()?;

    let mut decimal = f64::from(degrees) + minutes / 60.0;
    if matches!(hemisphere, "S" | "W") {
        decimal = -decimal;
    }
    Some(round_to(decimal, COORDINATE_DECIMALS))
}

/// Build an ISO-8601 UTC timestamp from RMC date and time fields
///
/// # Arguments
///
/// * `date` - `ddmmyy`
/// * `time` - `hhmmss.ss`
///
/// # Returns
///
/// `YYYY-MM-DDThh:mm:ss.ssZ`, or `None` for any malformed or impossible
/// value.
///
/// # Examples
///
/// ```
/// use tracker_node::nmea::decoder::compose_datetime;
///
/// assert_eq!(
///     compose_datetime("230394", "123519").as_deref(),
///     Some("2094-03-23T12:35:19.00Z"),
/// );
/// assert_eq!(compose_datetime("", "123519"), None);
/// ```
pub fn compose_datetime(date: &str, time: &str) -> Option<String> {
    if date.len() < 6 || time.len() < 6 {
        return None;
    }

    let day: u32 = date.get(0..2)?.parse().ok()?;
    let month: u32 = date.get(2..4)?.parse().ok()?;
    let year: i32 = 2000 + date.get(4..6)?.parse::<i32>().ok()?;
    let hour: u32 = time.get(0..2)?.parse().ok()?;
    let minute: u32 = time.get(2..4)?.parse().ok()?;
    let seconds: f64 = time.get(4..)?.parse().ok()?;
    if !(seconds.is_finite() && (0.0..60.0).contains(&seconds)) {
        return None;
    }

    NaiveDate::from_ymd_opt(year, month, day)?;
    NaiveTime::from_hms_opt(hour, minute, seconds as u32)?;

    // Centisecond precision, never rounding up into the next minute
    let centis = (seconds * 100.0).round().min(5999.0);
    Some(format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:05.2}Z",
        year,
        month,
        day,
        hour,
        minute,
        centis / 100.0
    ))
}

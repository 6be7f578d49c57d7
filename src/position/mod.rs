//! # Position Parser & Validator
//!
//! Maintains the latest [`Fix`] from RMC and GGA sentences.
//!
//! Validation runs in three stages:
//! - talker filter (`$GN`, `$GP`, `$GA`)
//! - checksum gate, a failing sentence changes nothing
//! - jump rejection against the last accepted position

pub mod reader;

use std::time::Instant;
use tracing::{debug, warn};

use crate::geo::{haversine_m, KNOTS_TO_MPS};
use crate::nmea::checksum::verify_checksum;
use crate::nmea::decoder::decode_sentence;
use crate::nmea::protocol::*;

/// Course over ground is dropped below this speed (knots)
pub const MIN_COURSE_SPEED_KNOTS: f64 = 0.5;

/// Why a line did not produce a full update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Missing or wrong `*hh`
    Checksum,
    /// Foreign talker or sentence id
    Unsupported,
    /// Position implied an impossible speed. Time, speed and course from
    /// the sentence were still applied.
    Jump,
}

/// Result of feeding one line to the parser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    Updated,
    Rejected(RejectReason),
}

#[derive(Debug, Clone, Copy)]
struct AcceptedPosition {
    latitude: f64,
    longitude: f64,
    at: Instant,
}

/// Stateful RMC/GGA parser
///
/// # Examples
///
/// ```
/// use tracker_node::position::{ParseOutcome, PositionParser};
///
/// let mut parser = PositionParser::new(25.0);
/// let line = "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A";
/// assert_eq!(parser.parse_line(line), ParseOutcome::Updated);
/// assert!(parser.fix().latitude.is_some());
/// ```
#[derive(Debug)]
pub struct PositionParser {
    fix: Fix,
    last_accepted: Option<AcceptedPosition>,
    max_speed_mps: f64,
}

impl PositionParser {
    /// Create a parser with a speed ceiling in knots
    pub fn new(max_speed_knots: f64) -> Self {
        Self {
            fix: Fix::default(),
            last_accepted: None,
            max_speed_mps: max_speed_knots * KNOTS_TO_MPS,
        }
    }

    /// Copy of the current fix
    pub fn fix(&self) -> Fix {
        self.fix.clone()
    }

    /// Feed one framed line, timed against the wall clock
    pub fn parse_line(&mut self, line: &str) -> ParseOutcome {
        self.parse_line_at(line, Instant::now())
    }

    /// Feed one framed line observed at `now`
    pub fn parse_line_at(&mut self, line: &str, now: Instant) -> ParseOutcome {
        if !GNSS_TALKERS.iter().any(|talker| line.starts_with(talker)) {
            return ParseOutcome::Rejected(RejectReason::Unsupported);
        }
        if !verify_checksum(line) {
            return ParseOutcome::Rejected(RejectReason::Checksum);
        }

        match decode_sentence(line) {
            Ok(Sentence::Rmc(rmc)) => self.apply_rmc(rmc, now),
            Ok(Sentence::Gga(gga)) => {
                self.apply_gga(gga);
                ParseOutcome::Updated
            }
            Ok(Sentence::Mwv(_)) => ParseOutcome::Rejected(RejectReason::Unsupported),
            Err(e) => {
                debug!("Ignoring sentence: {}", e);
                ParseOutcome::Rejected(RejectReason::Unsupported)
            }
        }
    }

    fn apply_rmc(&mut self, rmc: RmcSentence, now: Instant) -> ParseOutcome {
        // The receiver clock is usable even without a position
        self.fix.timestamp = rmc.timestamp;
        self.fix.status = rmc.status;
        self.fix.speed_over_ground = rmc.speed_over_ground;
        self.fix.course_over_ground = rmc.course_over_ground;

        if rmc.status != FixStatus::Fix {
            self.fix.latitude = None;
            self.fix.longitude = None;
            self.fix.altitude = None;
            return ParseOutcome::Updated;
        }

        let (Some(latitude), Some(longitude)) = (rmc.latitude, rmc.longitude) else {
            return ParseOutcome::Updated;
        };

        if let Some(previous) = self.last_accepted {
            let dt = now.saturating_duration_since(previous.at).as_secs_f64();
            let distance =
                haversine_m(previous.latitude, previous.longitude, latitude, longitude);
            if dt > 0.0 && distance / dt > self.max_speed_mps {
                warn!(
                    "GPS spike rejected: {:.1} m in {:.2} s = {:.1} m/s",
                    distance,
                    dt,
                    distance / dt
                );
                return ParseOutcome::Rejected(RejectReason::Jump);
            }
        }

        self.last_accepted = Some(AcceptedPosition {
            latitude,
            longitude,
            at: now,
        });
        self.fix.latitude = Some(latitude);
        self.fix.longitude = Some(longitude);
        if matches!(rmc.speed_over_ground, Some(sog) if sog < MIN_COURSE_SPEED_KNOTS) {
            self.fix.course_over_ground = None;
        }
        ParseOutcome::Updated
    }

    fn apply_gga(&mut self, gga: GgaSentence) {
        self.fix.fix_quality = gga.fix_quality;
        self.fix.satellite_count = gga.satellite_count;
        self.fix.horizontal_dilution = gga.horizontal_dilution;
        self.fix.altitude = gga.altitude;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::round_to;
    use crate::nmea::checksum::with_checksum;
    use std::time::Duration;

    const RMC_FIX: &str = "$GNRMC,083559.00,A,4717.11437,N,00833.91522,E,0.004,77.52,091202,,,A*49";
    const RMC_NO_FIX: &str = "$GNRMC,083559.10,V,,,,,,,091202,,,N*68";
    const RMC_JUMP: &str = "$GNRMC,083559.20,A,4817.11437,N,00833.91522,E,30.0,45.0,091202,,,A*45";
    const GGA: &str = "$GNGGA,083559.00,4717.11437,N,00833.91522,E,1,08,1.01,499.6,M,48.0,M,,*46";

    fn parser() -> PositionParser {
        PositionParser::new(25.0)
    }

    #[test]
    fn test_rmc_fix_updates_position() {
        let mut parser = parser();
        assert_eq!(parser.parse_line(RMC_FIX), ParseOutcome::Updated);

        let fix = parser.fix();
        assert_eq!(fix.status, FixStatus::Fix);
        assert_eq!(fix.timestamp.as_deref(), Some("2002-12-09T08:35:59.00Z"));
        assert_eq!(fix.latitude, Some(47.2852395));
        assert_eq!(round_to(fix.longitude.unwrap(), 6), 8.565254);
        assert_eq!(fix.speed_over_ground, Some(0.004));
    }

    #[test]
    fn test_course_suppressed_when_slow() {
        let mut parser = parser();
        parser.parse_line(RMC_FIX);
        assert_eq!(parser.fix().course_over_ground, None);
    }

    #[test]
    fn test_course_kept_when_moving() {
        let mut parser = parser();
        let line = with_checksum("GNRMC,083600.00,A,4717.11437,N,00833.91522,E,0.6,77.52,091202,,,A");
        parser.parse_line(&line);
        assert_eq!(parser.fix().course_over_ground, Some(77.52));
    }

    #[test]
    fn test_course_kept_without_speed() {
        let mut parser = parser();
        let line = with_checksum("GNRMC,083600.00,A,4717.11437,N,00833.91522,E,,77.52,091202,,,A");
        parser.parse_line(&line);
        assert_eq!(parser.fix().course_over_ground, Some(77.52));
    }

    #[test]
    fn test_corrupted_checksum_leaves_fix_unchanged() {
        let mut parser = parser();
        parser.parse_line(RMC_FIX);
        parser.parse_line(GGA);
        let before = parser.fix();

        // Flip each checksum digit in turn
        for corrupted in [
            RMC_NO_FIX.replace("*68", "*69"),
            RMC_NO_FIX.replace("*68", "*78"),
            GGA.replace("*46", "*47"),
            RMC_JUMP.replace("4817", "4818"),
        ] {
            assert_eq!(
                parser.parse_line(&corrupted),
                ParseOutcome::Rejected(RejectReason::Checksum)
            );
            assert_eq!(parser.fix(), before);
        }
    }

    #[test]
    fn test_no_fix_clears_position() {
        let mut parser = parser();
        parser.parse_line(RMC_FIX);
        parser.parse_line(GGA);
        assert!(parser.fix().altitude.is_some());

        assert_eq!(parser.parse_line(RMC_NO_FIX), ParseOutcome::Updated);
        let fix = parser.fix();
        assert_eq!(fix.status, FixStatus::NoFix);
        assert_eq!(fix.latitude, None);
        assert_eq!(fix.longitude, None);
        assert_eq!(fix.altitude, None);
        // Clock still advances without a fix
        assert_eq!(fix.timestamp.as_deref(), Some("2002-12-09T08:35:59.10Z"));
        // GGA-only fields survive
        assert_eq!(fix.satellite_count, Some(8));
    }

    #[test]
    fn test_jump_rejected_asymmetrically() {
        let mut parser = parser();
        let t0 = Instant::now();
        assert_eq!(parser.parse_line_at(RMC_FIX, t0), ParseOutcome::Updated);

        let outcome = parser.parse_line_at(RMC_JUMP, t0 + Duration::from_millis(100));
        assert_eq!(outcome, ParseOutcome::Rejected(RejectReason::Jump));

        let fix = parser.fix();
        assert_eq!(fix.latitude, Some(47.2852395));
        assert_eq!(fix.timestamp.as_deref(), Some("2002-12-09T08:35:59.20Z"));
        assert_eq!(fix.speed_over_ground, Some(30.0));
        assert_eq!(fix.course_over_ground, Some(45.0));
    }

    #[test]
    fn test_small_move_accepted() {
        let mut parser = parser();
        let t0 = Instant::now();
        parser.parse_line_at(RMC_FIX, t0);

        let line = with_checksum("GNRMC,083600.00,A,4717.11500,N,00833.91522,E,2.1,10.0,091202,,,A");
        assert_eq!(
            parser.parse_line_at(&line, t0 + Duration::from_secs(1)),
            ParseOutcome::Updated
        );
        assert_eq!(parser.fix().latitude, Some(47.28525));
    }

    #[test]
    fn test_jump_measured_from_last_accepted() {
        let mut parser = parser();
        let t0 = Instant::now();
        parser.parse_line_at(RMC_FIX, t0);
        parser.parse_line_at(RMC_JUMP, t0 + Duration::from_millis(100));

        // After long enough the same far position becomes plausible
        let outcome = parser.parse_line_at(RMC_JUMP, t0 + Duration::from_secs(3 * 3600));
        assert_eq!(outcome, ParseOutcome::Updated);
        assert_eq!(parser.fix().latitude, Some(48.2852395));
    }

    #[test]
    fn test_same_instant_not_rejected() {
        let mut parser = parser();
        let t0 = Instant::now();
        parser.parse_line_at(RMC_FIX, t0);
        assert_eq!(parser.parse_line_at(RMC_JUMP, t0), ParseOutcome::Updated);
    }

    #[test]
    fn test_missing_axis_keeps_position() {
        let mut parser = parser();
        parser.parse_line(RMC_FIX);

        let line = with_checksum("GNRMC,083600.00,A,,N,00833.91522,E,1.0,12.0,091202,,,A");
        assert_eq!(parser.parse_line(&line), ParseOutcome::Updated);

        let fix = parser.fix();
        assert_eq!(fix.latitude, Some(47.2852395));
        assert_eq!(fix.timestamp.as_deref(), Some("2002-12-09T08:36:00.00Z"));
    }

    #[test]
    fn test_gga_updates_quality_fields() {
        let mut parser = parser();
        assert_eq!(parser.parse_line(GGA), ParseOutcome::Updated);

        let fix = parser.fix();
        assert_eq!(fix.fix_quality, Some(1));
        assert_eq!(fix.satellite_count, Some(8));
        assert_eq!(fix.horizontal_dilution, Some(1.01));
        assert_eq!(fix.altitude, Some(499.6));
        assert_eq!(fix.latitude, None);
    }

    #[test]
    fn test_foreign_talkers_ignored() {
        let mut parser = parser();
        let wind = with_checksum("IIMWV,045.0,R,5.2,M,A");
        assert_eq!(
            parser.parse_line(&wind),
            ParseOutcome::Rejected(RejectReason::Unsupported)
        );
        let beidou = with_checksum("BDRMC,083559.00,A,4717.11437,N,00833.91522,E,0.004,77.52,091202,,,A");
        assert_eq!(
            parser.parse_line(&beidou),
            ParseOutcome::Rejected(RejectReason::Unsupported)
        );
        assert_eq!(parser.fix(), Fix::default());
    }

    #[test]
    fn test_other_gnss_talkers_accepted() {
        let mut parser = parser();
        let line = "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A";
        assert_eq!(parser.parse_line(line), ParseOutcome::Updated);
        assert_eq!(round_to(parser.fix().latitude.unwrap(), 4), 48.1173);

        let gsa = with_checksum("GAGSA,A,3,,,,,,,,,,,,,2.5,1.3,2.1");
        assert_eq!(
            parser.parse_line(&gsa),
            ParseOutcome::Rejected(RejectReason::Unsupported)
        );
    }

    #[test]
    fn test_fix_is_a_copy() {
        let mut parser = parser();
        parser.parse_line(RMC_FIX);
        let copy = parser.fix();
        parser.parse_line(RMC_NO_FIX);
        assert_eq!(copy.status, FixStatus::Fix);
        assert_eq!(parser.fix().status, FixStatus::NoFix);
    }
}

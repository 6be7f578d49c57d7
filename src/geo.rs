//! # Geodesy Helpers
//!
//! Great-circle distance, unit conversions and decimal rounding shared by the
//! position parser and the sensor adapters.

/// Mean Earth radius in metres
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// One knot in metres per second
pub const KNOTS_TO_MPS: f64 = 0.514444;

/// One metre per second in knots
pub const MPS_TO_KNOTS: f64 = 1.943844;

/// Great-circle distance between two points in metres (haversine formula)
///
/// # Examples
///
/// ```
/// use tracker_node::geo::haversine_m;
///
/// // One degree of latitude is roughly 111.2 km
/// let d = haversine_m(0.0, 0.0, 1.0, 0.0);
/// assert!((d - 111_195.0).abs() < 1.0);
/// ```
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = phi2 - phi1;
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().asin()
}

/// Round to a fixed number of decimal places
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Normalize an angle into `[0, 360)` degrees
pub fn wrap_degrees(value: f64) -> f64 {
    value.rem_euclid(360.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_zero_distance() {
        assert_eq!(haversine_m(47.2, 8.5, 47.2, 8.5), 0.0);
    }

    #[test]
    fn test_haversine_one_arc_minute() {
        // One arc minute of latitude is one nautical mile (~1852 m)
        let d = haversine_m(47.0, 8.0, 47.0 + 1.0 / 60.0, 8.0);
        assert!((d - 1853.2).abs() < 1.0, "distance was {}", d);
    }

    #[test]
    fn test_haversine_symmetric() {
        let a = haversine_m(48.1173, 11.5167, 47.2852, 8.5653);
        let b = haversine_m(47.2852, 8.5653, 48.1173, 11.5167);
        assert!((a - b).abs() < 1e-6);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(48.117_300_004, 4), 48.1173);
        assert_eq!(round_to(1.005, 1), 1.0);
        assert_eq!(round_to(-8.123_456_789, 8), -8.123_456_79);
    }

    #[test]
    fn test_wrap_degrees() {
        assert_eq!(wrap_degrees(370.0), 10.0);
        assert_eq!(wrap_degrees(-10.0), 350.0);
        assert_eq!(wrap_degrees(360.0), 0.0);
    }

    #[test]
    fn test_unit_factors_are_reciprocal() {
        assert!((KNOTS_TO_MPS * MPS_TO_KNOTS - 1.0).abs() < 1e-5);
    }
}

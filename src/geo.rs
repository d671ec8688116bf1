//! Pure geographic helper functions invoked by the decoder.
//!
//! These are deliberately simple: a real deployment would swap the timezone
//! heuristic for a timezone-database crate, but the decoder only calls
//! through the narrow signatures below, so that substitution never touches
//! bit-level parsing code.

use chrono::FixedOffset;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two `(lat, lon)` points in decimal
/// degrees, in meters.
pub fn great_circle_distance_m(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lon1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lon2) = (b.0.to_radians(), b.1.to_radians());

    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().asin();

    EARTH_RADIUS_M * c
}

/// Longitude-bucketed UTC offset heuristic, standing in for a full
/// timezone-database lookup. Fifteen degrees of longitude per hour,
/// clamped to the usual UTC offset range.
pub fn timezone_offset(_lat: f64, lon: f64) -> FixedOffset {
    let hours = (lon / 15.0).round() as i32;
    let clamped = hours.clamp(-12, 14);
    FixedOffset::east_opt(clamped * 3600).unwrap_or_else(|| FixedOffset::east_opt(0).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_for_identical_points() {
        let p = (54.7, 39.8);
        assert!(great_circle_distance_m(p, p) < 1e-6);
    }

    #[test]
    fn one_degree_of_latitude_is_about_111km() {
        let d = great_circle_distance_m((0.0, 0.0), (1.0, 0.0));
        assert!((d - 111_195.0).abs() < 500.0, "d={d}");
    }

    #[test]
    fn timezone_offset_tracks_longitude_bucket() {
        assert_eq!(timezone_offset(0.0, 0.0).local_minus_utc(), 0);
        assert_eq!(timezone_offset(0.0, 37.5).local_minus_utc(), 3 * 3600);
        assert_eq!(timezone_offset(0.0, -90.0).local_minus_utc(), -6 * 3600);
    }

    #[test]
    fn timezone_offset_clamps_extremes() {
        assert_eq!(timezone_offset(0.0, 1000.0).local_minus_utc(), 14 * 3600);
        assert_eq!(timezone_offset(0.0, -1000.0).local_minus_utc(), -12 * 3600);
    }
}

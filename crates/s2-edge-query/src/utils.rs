//! Utility functions for converting between geographic and unit-sphere coordinates

use geo::Point;
use glam::DVec3;

/// Maximum deviation of `|p|^2` from 1 for a point to count as unit length
pub const UNIT_LENGTH_TOLERANCE: f64 = 5.0 * f64::EPSILON;

/// Convert WGS84 (lat, lng) in degrees to a unit vector
///
/// # Arguments
/// * `lat` - Latitude in degrees (-90 to 90)
/// * `lng` - Longitude in degrees (-180 to 180)
#[inline(always)]
pub fn lat_lng_to_point(lat: f64, lng: f64) -> DVec3 {
    let (sin_lat, cos_lat) = lat.to_radians().sin_cos();
    let (sin_lng, cos_lng) = lng.to_radians().sin_cos();
    DVec3::new(cos_lat * cos_lng, cos_lat * sin_lng, sin_lat)
}

/// Convert a unit vector to WGS84 (lat, lng) in degrees
///
/// `p` does not need to be unit length.
#[inline(always)]
pub fn point_to_lat_lng(p: DVec3) -> (f64, f64) {
    let lat = p.z.atan2((p.x * p.x + p.y * p.y).sqrt()).to_degrees();
    let lng = p.y.atan2(p.x).to_degrees();
    (lat, lng)
}

/// Convert a geo point (`x` = longitude, `y` = latitude) to a unit vector
#[inline(always)]
pub fn geo_point_to_point(point: &Point<f64>) -> DVec3 {
    lat_lng_to_point(point.y(), point.x())
}

/// Convert a unit vector to a geo point (`x` = longitude, `y` = latitude)
#[inline(always)]
pub fn point_to_geo_point(p: DVec3) -> Point<f64> {
    let (lat, lng) = point_to_lat_lng(p);
    Point::new(lng, lat)
}

/// Check if a point is unit length within rounding error
#[inline(always)]
pub fn is_unit_length(p: DVec3) -> bool {
    (p.length_squared() - 1.0).abs() <= UNIT_LENGTH_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lat_lng_to_point_axes() {
        assert!((lat_lng_to_point(0.0, 0.0) - DVec3::X).length() < 1e-15);
        assert!((lat_lng_to_point(0.0, 90.0) - DVec3::Y).length() < 1e-15);
        assert!((lat_lng_to_point(90.0, 0.0) - DVec3::Z).length() < 1e-15);
        assert!((lat_lng_to_point(-90.0, 0.0) - DVec3::NEG_Z).length() < 1e-15);
    }

    #[test]
    fn test_lat_lng_roundtrip() {
        let lat = 51.5074;
        let lng = -0.1278;

        let p = lat_lng_to_point(lat, lng);
        assert!(is_unit_length(p));
        let (lat2, lng2) = point_to_lat_lng(p);

        assert!((lat - lat2).abs() < 1e-12);
        assert!((lng - lng2).abs() < 1e-12);
    }

    #[test]
    fn test_geo_point_roundtrip() {
        let point = Point::new(-122.4194, 37.7749);
        let back = point_to_geo_point(geo_point_to_point(&point));
        assert!((point.x() - back.x()).abs() < 1e-12);
        assert!((point.y() - back.y()).abs() < 1e-12);
    }

    #[test]
    fn test_is_unit_length() {
        assert!(is_unit_length(DVec3::new(0.6, 0.8, 0.0)));
        assert!(!is_unit_length(DVec3::new(1.0, 1.0, 0.0)));
        assert!(!is_unit_length(DVec3::ZERO));
    }
}

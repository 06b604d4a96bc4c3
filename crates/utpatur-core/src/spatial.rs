//! Spatial math for path distances, bearings and camera offsets.

use crate::models::GeoPoint;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters between two positions given in degrees.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

pub fn distance_between(a: &GeoPoint, b: &GeoPoint) -> f64 {
    haversine_distance(a.lat, a.lon, b.lat, b.lon)
}

/// Initial bearing from point 1 to point 2 in degrees, normalized to [0, 360).
pub fn bearing_deg(from: &GeoPoint, to: &GeoPoint) -> f64 {
    let phi1 = from.lat.to_radians();
    let phi2 = to.lat.to_radians();
    let delta_lambda = (to.lon - from.lon).to_radians();

    let x = delta_lambda.sin() * phi2.cos();
    let y = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();

    normalize_bearing(x.atan2(y).to_degrees())
}

/// Offset a position by distance and bearing.
///
/// # Arguments
/// * `origin` - Starting position
/// * `distance_m` - Distance in meters
/// * `bearing_deg` - Bearing in degrees (0 = north, 90 = east)
pub fn offset_by_bearing(origin: &GeoPoint, distance_m: f64, bearing_deg: f64) -> GeoPoint {
    if distance_m.abs() <= f64::EPSILON {
        return *origin;
    }

    let bearing_rad = bearing_deg.to_radians();
    let lat1 = origin.lat.to_radians();
    let lon1 = origin.lon.to_radians();
    let angular_distance = distance_m / EARTH_RADIUS_M;

    let sin_lat1 = lat1.sin();
    let cos_lat1 = lat1.cos();
    let sin_ad = angular_distance.sin();
    let cos_ad = angular_distance.cos();

    let sin_lat2 = sin_lat1 * cos_ad + cos_lat1 * sin_ad * bearing_rad.cos();
    let lat2 = sin_lat2.clamp(-1.0, 1.0).asin();

    let y = bearing_rad.sin() * sin_ad * cos_lat1;
    let x = cos_ad - sin_lat1 * sin_lat2;
    let mut lon2 = lon1 + y.atan2(x);
    lon2 =
        (lon2 + std::f64::consts::PI).rem_euclid(2.0 * std::f64::consts::PI) - std::f64::consts::PI;

    GeoPoint::new(lat2.to_degrees(), lon2.to_degrees())
}

pub fn normalize_bearing(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Signed shortest turn from `from` to `to`, in (-180, 180].
pub fn bearing_delta(from: f64, to: f64) -> f64 {
    let delta = (to - from).rem_euclid(360.0);
    if delta > 180.0 {
        delta - 360.0
    } else {
        delta
    }
}

/// Move `current` a fraction of the way toward `target` along the short arc.
pub fn lerp_bearing(current: f64, target: f64, factor: f64) -> f64 {
    normalize_bearing(current + bearing_delta(current, target) * factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_known_distance() {
        // ~111km between these points (1 degree latitude)
        let dist = haversine_distance(0.0, 0.0, 1.0, 0.0);
        assert!((dist - 111_194.0).abs() < 100.0);
    }

    #[test]
    fn test_haversine_same_point() {
        let dist = haversine_distance(68.3581, 18.7820, 68.3581, 18.7820);
        assert!(dist < 0.001);
    }

    #[test]
    fn offset_then_measure_matches_distance() {
        let abisko = GeoPoint::new(68.3581, 18.7820);
        let moved = offset_by_bearing(&abisko, 1_500.0, 215.0);
        let dist = distance_between(&abisko, &moved);
        assert!((dist - 1_500.0).abs() < 0.5, "got {dist}");
        let back = bearing_deg(&abisko, &moved);
        assert!((back - 215.0).abs() < 0.1, "got {back}");
    }

    #[test]
    fn bearing_due_east_and_north() {
        let origin = GeoPoint::new(67.0, 18.0);
        assert!(bearing_deg(&origin, &GeoPoint::new(68.0, 18.0)).abs() < 1e-6);
        let east = bearing_deg(&origin, &GeoPoint::new(67.0, 18.1));
        assert!((east - 90.0).abs() < 0.1);
    }

    #[test]
    fn lerp_bearing_wraps_through_north() {
        let mid = lerp_bearing(350.0, 10.0, 0.5);
        assert!(mid.abs() < 1e-9 || (mid - 360.0).abs() < 1e-9, "got {mid}");

        let step = lerp_bearing(350.0, 10.0, 0.25);
        assert!((step - 355.0).abs() < 1e-9, "got {step}");

        let back = lerp_bearing(10.0, 350.0, 0.25);
        assert!((back - 5.0).abs() < 1e-9, "got {back}");
    }

    #[test]
    fn lerp_bearing_never_crosses_south_for_short_turns() {
        let mut heading = 350.0;
        for _ in 0..200 {
            heading = lerp_bearing(heading, 10.0, 0.025);
            assert!(!(90.0..270.0).contains(&heading), "went the long way: {heading}");
        }
        assert!(bearing_delta(heading, 10.0).abs() < 0.2);
    }
}

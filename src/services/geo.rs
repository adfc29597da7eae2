//! Geographic calculations

use crate::types::Coordinates;

/// Earth radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle (haversine) distance between two points in kilometers.
///
/// Symmetric in its arguments and exactly zero for identical points.
/// NaN or infinite inputs yield NaN.
pub fn haversine_distance(from: &Coordinates, to: &Coordinates) -> f64 {
    let d_lat = (to.lat - from.lat).abs().to_radians();
    let d_lon = (to.lng - from.lng).abs().to_radians();

    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);

    // Rounding can push `a` slightly past 1 near antipodes
    let c = 2.0 * a.clamp(0.0, 1.0).sqrt().asin();

    EARTH_RADIUS_KM * c
}

#[cfg(test)]
/// Haversine distance from raw latitude/longitude pairs
pub fn distance_km(lat_a: f64, lon_a: f64, lat_b: f64, lon_b: f64) -> f64 {
    haversine_distance(&Coordinates::new(lat_a, lon_a), &Coordinates::new(lat_b, lon_b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_longitude_offset_in_bangalore() {
        let distance = distance_km(12.9716, 77.5946, 12.9716, 77.6046);
        assert!((distance - 1.09).abs() < 0.02, "got {}", distance);
    }

    #[test]
    fn test_haversine_prague_brno() {
        let prague = Coordinates { lat: 50.0755, lng: 14.4378 };
        let brno = Coordinates { lat: 49.1951, lng: 16.6068 };

        let distance = haversine_distance(&prague, &brno);

        // Prague to Brno is approximately 185 km
        assert!((distance - 185.0).abs() < 5.0);
    }

    #[test]
    fn test_haversine_same_point() {
        let point = Coordinates { lat: 12.9716, lng: 77.5946 };
        assert_eq!(haversine_distance(&point, &point), 0.0);
    }

    #[test]
    fn test_haversine_symmetric() {
        let pairs = [
            (Coordinates::new(12.9716, 77.5946), Coordinates::new(13.0827, 80.2707)),
            (Coordinates::new(-33.8688, 151.2093), Coordinates::new(51.5074, -0.1278)),
            (Coordinates::new(89.9, 10.0), Coordinates::new(-89.9, -170.0)),
        ];
        for (a, b) in pairs {
            assert_eq!(haversine_distance(&a, &b), haversine_distance(&b, &a));
        }
    }

    #[test]
    fn test_haversine_antipodal_is_half_circumference() {
        let distance = distance_km(0.0, 0.0, 0.0, 180.0);
        let half = std::f64::consts::PI * EARTH_RADIUS_KM;
        assert!(distance.is_finite());
        assert!((distance - half).abs() < 1e-6);
    }

    #[test]
    fn test_haversine_pole_to_pole() {
        let distance = distance_km(90.0, 0.0, -90.0, 0.0);
        assert!((distance - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);
    }

    #[test]
    fn test_haversine_nan_and_infinity_propagate() {
        assert!(distance_km(f64::NAN, 0.0, 1.0, 1.0).is_nan());
        assert!(distance_km(0.0, f64::INFINITY, 1.0, 1.0).is_nan());
    }
}

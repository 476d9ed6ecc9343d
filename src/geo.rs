// src/geo.rs
//! Geographic coordinates and great-circle distance

use crate::error::{RecorderError, Result};
use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters used by [`distance`].
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Build a coordinate, rejecting values outside the WGS84 ranges.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        let coordinate = Self { latitude, longitude };
        if coordinate.is_valid() {
            Ok(coordinate)
        } else {
            Err(RecorderError::InvalidCoordinate { latitude, longitude })
        }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }

    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        distance(self, other)
    }
}

/// Haversine distance between two coordinates in meters.
///
/// NaN inputs propagate to the result; validate with [`Coordinate::new`] first.
pub fn distance(a: &Coordinate, b: &Coordinate) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate { latitude: lat, longitude: lon }
    }

    #[test]
    fn test_distance_is_symmetric() {
        let pairs = [
            (coord(0.0, 0.0), coord(0.0, 0.0001)),
            (coord(42.438878, -71.119277), coord(48.117, 11.517)),
            (coord(-33.9, 151.2), coord(51.5, -0.12)),
            (coord(89.9, 179.9), coord(-89.9, -179.9)),
        ];
        for (a, b) in pairs {
            assert_eq!(distance(&a, &b), distance(&b, &a));
        }
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        let a = coord(42.438878, -71.119277);
        assert_eq!(distance(&a, &a), 0.0);
    }

    #[test]
    fn test_small_longitude_step_at_equator() {
        let d = distance(&coord(0.0, 0.0), &coord(0.0, 0.0001));
        assert!((d - 11.12).abs() < 0.05, "got {}", d);
    }

    #[test]
    fn test_one_degree_latitude() {
        let d = coord(10.0, 20.0).distance_to(&coord(11.0, 20.0));
        assert!((d - 111_195.0).abs() < 1.0, "got {}", d);
    }

    #[test]
    fn test_nan_propagates() {
        let d = distance(&coord(f64::NAN, 0.0), &coord(0.0, 0.0));
        assert!(d.is_nan());
    }

    #[test]
    fn test_coordinate_validation() {
        assert!(Coordinate::new(90.0, -180.0).is_ok());
        assert!(matches!(
            Coordinate::new(90.5, 0.0),
            Err(RecorderError::InvalidCoordinate { .. })
        ));
        assert!(Coordinate::new(0.0, 181.0).is_err());
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
    }
}

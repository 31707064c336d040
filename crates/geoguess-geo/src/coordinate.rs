//! A latitude/longitude pair in degrees.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{distance_km, GeoError};

/// A point on the globe, in decimal degrees.
///
/// The fields are public so wire types can deserialize straight into a
/// `Coordinate`. Anything that came off the wire must go through
/// [`Coordinate::validated`] (or be built with [`Coordinate::new`]) before
/// it reaches the distance math.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    /// Builds a coordinate, rejecting out-of-range or non-finite values.
    pub fn new(lat: f64, lon: f64) -> Result<Self, GeoError> {
        Self { lat, lon }.validated()
    }

    /// Returns `self` if both components are in range.
    pub fn validated(self) -> Result<Self, GeoError> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(GeoError::LatitudeOutOfRange(self.lat));
        }
        if !self.lon.is_finite() || !(-180.0..=180.0).contains(&self.lon) {
            return Err(GeoError::LongitudeOutOfRange(self.lon));
        }
        Ok(self)
    }

    /// `true` when [`validated`](Self::validated) would succeed.
    pub fn is_valid(&self) -> bool {
        self.validated().is_ok()
    }

    /// Great-circle distance to `other` in kilometres.
    pub fn distance_km(&self, other: &Coordinate) -> f64 {
        distance_km(self.lat, self.lon, other.lat, other.lon)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.5}, {:.5})", self.lat, self.lon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_accepts_bounds() {
        assert!(Coordinate::new(90.0, 180.0).is_ok());
        assert!(Coordinate::new(-90.0, -180.0).is_ok());
        assert!(Coordinate::new(0.0, 0.0).is_ok());
    }

    #[test]
    fn test_new_rejects_out_of_range() {
        assert_eq!(
            Coordinate::new(90.5, 0.0),
            Err(GeoError::LatitudeOutOfRange(90.5))
        );
        assert_eq!(
            Coordinate::new(0.0, -180.1),
            Err(GeoError::LongitudeOutOfRange(-180.1))
        );
    }

    #[test]
    fn test_new_rejects_nan() {
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
        assert!(Coordinate::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_deserialized_coordinate_can_be_invalid_until_validated() {
        let c: Coordinate =
            serde_json::from_str(r#"{"lat": 120.0, "lon": 0.0}"#).unwrap();
        assert!(!c.is_valid());
    }

    #[test]
    fn test_distance_method_matches_free_function() {
        let a = Coordinate::new(40.0, -75.0).unwrap();
        let b = Coordinate::new(41.0, -75.0).unwrap();
        assert_eq!(a.distance_km(&b), distance_km(40.0, -75.0, 41.0, -75.0));
    }
}

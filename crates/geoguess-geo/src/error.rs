//! Error types for coordinate validation.

/// Errors produced when building a [`Coordinate`](crate::Coordinate).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeoError {
    /// Latitude outside `[-90, 90]` or not a finite number.
    #[error("latitude {0} out of range [-90, 90]")]
    LatitudeOutOfRange(f64),

    /// Longitude outside `[-180, 180]` or not a finite number.
    #[error("longitude {0} out of range [-180, 180]")]
    LongitudeOutOfRange(f64),
}

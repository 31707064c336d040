//! Pure geography math for Geoguess.
//!
//! Two functions carry the whole game's fairness:
//!
//! - [`distance_km`]: haversine great-circle distance on a sphere of
//!   radius [`EARTH_RADIUS_KM`].
//! - [`score`]: exponential decay from 1000 points at zero distance
//!   down towards 0.
//!
//! Nothing here allocates, locks, or logs. The room engine calls these on
//! the hot path of every guess.

mod coordinate;
mod error;
mod scoring;

pub use coordinate::Coordinate;
pub use error::GeoError;
pub use scoring::{
    distance_km, score, score_with_decay, DECAY_KM, EARTH_RADIUS_KM,
    MAX_SCORE,
};

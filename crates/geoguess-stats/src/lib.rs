//! Read-only statistics over the game result log.
//!
//! The [`StatsAggregator`] never writes. Every query reads the
//! [`Store`](geoguess_store::Store) afresh, so results recorded by room
//! actors show up on the next call.

mod aggregator;
mod error;

pub use aggregator::{
    DEFAULT_LIMIT, DEFAULT_WINDOW, MAX_LIMIT, StatsAggregator,
};
pub use error::StatsError;

//! Error types for the stats layer.

use geoguess_store::StoreError;

/// Errors that can occur while aggregating statistics.
#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    /// Reading the result log failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

//! Error types for the persistence layer.

/// Errors a [`Store`](crate::Store) can return.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The record to update or delete does not exist.
    #[error("record not found: {0}")]
    NotFound(String),

    /// A record with the same key already exists.
    #[error("duplicate record: {0}")]
    Duplicate(String),

    /// The backing store could not be reached or refused the write.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

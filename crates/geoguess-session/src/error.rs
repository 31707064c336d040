//! Error types for the session layer.

use geoguess_protocol::UserId;

/// Errors that can occur during session management.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The [`Authenticator`](crate::Authenticator) rejected the token.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// No session exists for the given user.
    #[error("session not found for user {0}")]
    NotFound(UserId),

    /// The reconnection token doesn't match anything the server issued.
    #[error("invalid reconnection token")]
    InvalidToken,

    /// The reconnection grace period has elapsed.
    #[error("session expired for user {0}")]
    SessionExpired(UserId),

    /// The user already has a connected session. One connection per user.
    #[error("user {0} already has an active session")]
    AlreadyConnected(UserId),
}

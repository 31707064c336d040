//! Error types for the room layer.

use geoguess_geo::GeoError;
use geoguess_protocol::{ErrorKind, RoomCode, UserId};
use geoguess_store::StoreError;

/// Errors that can occur during room and round operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomCode),

    /// The player is not a member of this room.
    #[error("player {0} is not in room {1}")]
    NotMember(UserId, RoomCode),

    /// The requested round does not exist (yet).
    #[error("round {round} not found in room {code}")]
    RoundNotFound { code: RoomCode, round: u32 },

    /// No more player slots.
    #[error("room {0} is full")]
    RoomFull(RoomCode),

    /// The player already holds a membership in this room.
    #[error("player {0} already in room {1}")]
    AlreadyMember(UserId, RoomCode),

    /// Guesses are write-once per player per round.
    #[error("player {user} already guessed in round {round}")]
    AlreadyGuessed { user: UserId, round: u32 },

    /// The guessed coordinate is out of range.
    #[error("invalid guess: {0}")]
    InvalidGuess(#[from] GeoError),

    /// The room or round is in a status that doesn't allow this operation.
    #[error("invalid room state for this operation: {0}")]
    InvalidState(String),

    /// A host-only action was attempted by another member.
    #[error("only the host can {0}")]
    NotHost(String),

    /// Every attempt to draw an unused room code collided.
    #[error("could not allocate a room code after {0} attempts")]
    CodeSpaceExhausted(u32),

    /// The persistence collaborator failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The room's actor is gone (closed between lookup and request).
    #[error("room {0} is unavailable")]
    Unavailable(RoomCode),
}

impl RoomError {
    /// The client-facing classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_)
            | Self::NotMember(..)
            | Self::RoundNotFound { .. }
            | Self::Unavailable(_) => ErrorKind::NotFound,
            Self::RoomFull(_)
            | Self::AlreadyMember(..)
            | Self::AlreadyGuessed { .. }
            | Self::InvalidGuess(_)
            | Self::InvalidState(_) => ErrorKind::BadState,
            Self::NotHost(_) => ErrorKind::Forbidden,
            Self::CodeSpaceExhausted(_) => ErrorKind::Conflict,
            Self::Store(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code() -> RoomCode {
        RoomCode::parse("ABC123").unwrap()
    }

    #[test]
    fn test_kinds() {
        assert_eq!(RoomError::NotFound(code()).kind(), ErrorKind::NotFound);
        assert_eq!(RoomError::RoomFull(code()).kind(), ErrorKind::BadState);
        assert_eq!(
            RoomError::AlreadyGuessed {
                user: UserId::from("a"),
                round: 1
            }
            .kind(),
            ErrorKind::BadState
        );
        assert_eq!(
            RoomError::NotHost("start the game".into()).kind(),
            ErrorKind::Forbidden
        );
        assert_eq!(
            RoomError::CodeSpaceExhausted(10).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            RoomError::Store(StoreError::Unavailable("down".into())).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(
            RoomError::NotHost("start the game".into()).to_string(),
            "only the host can start the game"
        );
        assert_eq!(RoomError::RoomFull(code()).to_string(), "room ABC123 is full");
    }
}

//! Unified error type for the Geoguess server.

use geoguess_geo::GeoError;
use geoguess_protocol::{ErrorKind, ProtocolError};
use geoguess_room::RoomError;
use geoguess_session::SessionError;
use geoguess_stats::StatsError;
use geoguess_store::StoreError;
use geoguess_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum GeoguessError {
    /// A transport-level error (connection, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (auth, reconnect, expired).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (full, not found, invalid state).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A statistics query failed.
    #[error(transparent)]
    Stats(#[from] StatsError),

    /// A coordinate outside the valid range.
    #[error(transparent)]
    Geo(#[from] GeoError),

    /// A direct store write failed (solo results).
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GeoguessError {
    /// The classification sent to clients in `ServerEvent::Error`.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Room(e) => e.kind(),
            Self::Protocol(_) | Self::Geo(_) => ErrorKind::BadState,
            Self::Session(SessionError::AlreadyConnected(_)) => {
                ErrorKind::Conflict
            }
            Self::Session(_) => ErrorKind::Forbidden,
            Self::Transport(_) | Self::Stats(_) | Self::Store(_) => {
                ErrorKind::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoguess_protocol::RoomCode;

    #[test]
    fn test_from_transport_error() {
        let err: GeoguessError = TransportError::Shutdown.into();
        assert!(matches!(err, GeoguessError::Transport(_)));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_from_protocol_error_is_bad_state() {
        let err: GeoguessError =
            ProtocolError::InvalidMessage("bad".into()).into();
        assert!(matches!(err, GeoguessError::Protocol(_)));
        assert_eq!(err.kind(), ErrorKind::BadState);
    }

    #[test]
    fn test_session_errors_classify() {
        let err: GeoguessError = SessionError::AuthFailed("nope".into()).into();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert!(err.to_string().contains("nope"));

        let err: GeoguessError =
            SessionError::AlreadyConnected("alice".into()).into();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_room_error_keeps_its_kind() {
        let code = RoomCode::parse("ABC123").unwrap();
        let err: GeoguessError = RoomError::RoomFull(code.clone()).into();
        assert_eq!(err.kind(), ErrorKind::BadState);

        let err: GeoguessError = RoomError::NotFound(code).into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "room ABC123 not found");
    }

    #[test]
    fn test_store_error_is_internal() {
        let err: GeoguessError = StoreError::Unavailable("down".into()).into();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}

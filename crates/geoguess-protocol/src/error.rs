//! Error types for the protocol layer.

use geoguess_geo::GeoError;

/// Errors that can occur while encoding, decoding, or validating wire data.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, a missing field, an unknown
    /// event type, or a room code that does not parse.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A room code with the wrong length or characters.
    #[error("invalid room code {0:?}")]
    InvalidRoomCode(String),

    /// A coordinate outside the valid latitude/longitude ranges.
    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(#[from] GeoError),

    /// The message decoded but breaks a protocol rule (wrong first frame,
    /// version mismatch, …).
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

//! Wire protocol for Geoguess.
//!
//! This crate defines the "language" that game clients and the server
//! speak:
//!
//! - **Identity types** ([`UserId`], [`RoomCode`]): who and where.
//! - **Room vocabulary** ([`RoomStatus`], [`RoundStatus`],
//!   [`RoomSettings`], [`RoomSnapshot`], …): what clients are shown.
//! - **Events** ([`ClientEvent`], [`ServerEvent`], [`Envelope`]): the
//!   messages that travel over a connection.
//! - **Codec** ([`Codec`], [`JsonCodec`]): how envelopes become bytes.
//! - **Outbox** ([`Outbox`]): the "send to player" capability the engine
//!   is handed by whatever owns the connections.
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope<ClientEvent>) → Orchestrator
//! Room actor → Outbox (ServerEvent) → Transport (bytes)
//! ```

mod codec;
mod error;
mod events;
mod outbox;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use events::{
    ClientEvent, CloseReason, Envelope, ErrorKind, Recipient, ServerEvent,
};
pub use geoguess_geo::Coordinate;
pub use outbox::Outbox;
pub use types::{
    now_millis, GameMode, GuessOutcome, LeaderboardEntry, PersonalStats,
    PlayerSummary, RecentWinner, RoomCode, RoomSettings, RoomSnapshot,
    RoomStatus, RoundStatus, RoundView, Standing, UserId, ROOM_CODE_ALPHABET,
    ROOM_CODE_LEN,
};

/// Protocol version clients must present in [`ClientEvent::Hello`].
pub const PROTOCOL_VERSION: u32 = 1;

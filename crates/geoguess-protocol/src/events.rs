//! Client and server events, and the envelope that carries them.

use geoguess_geo::Coordinate;
use serde::{Deserialize, Serialize};

use crate::{
    GuessOutcome, LeaderboardEntry, PersonalStats, PlayerSummary,
    RecentWinner, RoomCode, RoomSettings, RoomSnapshot, RoundStatus,
    Standing, UserId,
};

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Who inside a room should receive a server event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// Every current member.
    All,
    /// One member.
    Player(UserId),
    /// Every member except one (usually the player who caused the event
    /// and already got a direct reply).
    AllExcept(UserId),
}

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Classification of a failed request, sent to clients in
/// [`ServerEvent::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Room, round, or player absent.
    NotFound,
    /// Operation invalid for the current status (full room, second guess,
    /// round already sealed, malformed request, …).
    BadState,
    /// A non-host attempted a host-only action, or authentication failed.
    Forbidden,
    /// Room code generation ran out of attempts. Retryable.
    Conflict,
    /// Persistence or other server-side failure.
    Internal,
}

/// Why a room went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    /// The host left; rooms never migrate their host.
    HostLeft,
    /// The last member left.
    Empty,
    /// A finished room sat idle past its expiry.
    Expired,
}

// ---------------------------------------------------------------------------
// ClientEvent
// ---------------------------------------------------------------------------

/// Everything a client can ask of the server.
///
/// Internally tagged: `{ "type": "JoinRoom", "code": "K7QX2M" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    // -- Connection lifecycle --
    /// First frame on every connection. `token` is handed to the
    /// authenticator; `resume` is a reconnect token from an earlier
    /// [`ServerEvent::Welcome`].
    Hello {
        version: u32,
        #[serde(default)]
        token: Option<String>,
        #[serde(default)]
        resume: Option<String>,
    },
    Heartbeat {
        client_time: u64,
    },
    Disconnect {
        reason: String,
    },

    // -- Room membership --
    CreateRoom {
        #[serde(default)]
        settings: RoomSettings,
    },
    JoinRoom {
        code: RoomCode,
    },
    LeaveRoom {
        code: RoomCode,
    },
    SetReady {
        code: RoomCode,
        ready: bool,
    },
    GetRoom {
        code: RoomCode,
    },

    // -- Host controls --
    StartGame {
        code: RoomCode,
    },
    EndGame {
        code: RoomCode,
    },
    NextRound {
        code: RoomCode,
    },
    CloseRound {
        code: RoomCode,
    },

    // -- Play --
    SubmitGuess {
        code: RoomCode,
        round: u32,
        location: Coordinate,
    },
    SoloGuess {
        target: Coordinate,
        location: Coordinate,
    },

    // -- Statistics --
    Leaderboard {
        #[serde(default)]
        limit: Option<usize>,
    },
    RecentWinners {
        #[serde(default)]
        window_hours: Option<u64>,
        #[serde(default)]
        limit: Option<usize>,
    },
    MyStats,
}

// ---------------------------------------------------------------------------
// ServerEvent
// ---------------------------------------------------------------------------

/// Everything the server can tell a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    // -- Connection lifecycle --
    Welcome {
        user_id: UserId,
        reconnect_token: String,
        server_time: u64,
    },
    HeartbeatAck {
        client_time: u64,
        server_time: u64,
    },

    // -- Room membership --
    /// Full room snapshot; the direct reply to most room requests.
    RoomState {
        room: RoomSnapshot,
    },
    PlayerJoined {
        code: RoomCode,
        player: PlayerSummary,
    },
    PlayerLeft {
        code: RoomCode,
        user_id: UserId,
    },
    ReadyChanged {
        code: RoomCode,
        user_id: UserId,
        ready: bool,
    },
    LeftRoom {
        code: RoomCode,
        room_deleted: bool,
    },
    RoomClosed {
        code: RoomCode,
        reason: CloseReason,
    },

    // -- Rounds --
    GameStarted {
        code: RoomCode,
        total_rounds: u32,
    },
    RoundStarted {
        code: RoomCode,
        round: u32,
        total_rounds: u32,
        image_id: String,
        time_limit_secs: Option<u64>,
        status: RoundStatus,
    },
    /// The map opens for guessing (only sent when the engine separates
    /// `ACTIVE` from `GUESSING`).
    GuessingOpened {
        code: RoomCode,
        round: u32,
    },
    GuessAccepted {
        code: RoomCode,
        outcome: GuessOutcome,
    },
    /// Someone else locked in a guess. Carries no location.
    PlayerGuessed {
        code: RoomCode,
        round: u32,
        user_id: UserId,
    },
    RoundResults {
        code: RoomCode,
        round: u32,
        target: Coordinate,
        image_id: String,
        outcomes: Vec<GuessOutcome>,
        standings: Vec<Standing>,
    },
    /// Results display is over and the host must start the next round.
    RoundFinished {
        code: RoomCode,
        round: u32,
    },
    GameFinished {
        code: RoomCode,
        standings: Vec<Standing>,
    },

    // -- Solo and statistics --
    SoloResult {
        distance_km: f64,
        score: u32,
    },
    Leaderboard {
        entries: Vec<LeaderboardEntry>,
    },
    RecentWinners {
        entries: Vec<RecentWinner>,
    },
    PersonalStats {
        stats: PersonalStats,
    },

    // -- Errors --
    Error {
        kind: ErrorKind,
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The top-level frame. Every message on the wire is an `Envelope`.
///
/// `seq` counts frames per direction per connection; `timestamp` is
/// milliseconds since the sender's connection started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub seq: u64,
    pub timestamp: u64,
    pub body: T,
}

impl<T> Envelope<T> {
    pub fn new(seq: u64, timestamp: u64, body: T) -> Self {
        Self {
            seq,
            timestamp,
            body,
        }
    }
}

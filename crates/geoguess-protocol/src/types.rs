//! Identities, statuses, settings, and the read models shown to clients.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use geoguess_geo::Coordinate;
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Milliseconds since the Unix epoch. Used for every persisted timestamp.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// An authenticated user's identity.
///
/// Opaque: whatever the external auth provider hands us. Serialized as a
/// plain string.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Characters a room code may contain. `O` and `0` are left out because
/// players read codes aloud and type them by hand.
pub const ROOM_CODE_ALPHABET: &str = "ABCDEFGHIJKLMNPQRSTUVWXYZ123456789";

/// Number of characters in a room code.
pub const ROOM_CODE_LEN: usize = 6;

/// A six-character room code such as `K7QX2M`.
///
/// Always stored uppercase. [`RoomCode::parse`] accepts any case, so
/// `"k7qx2m"` and `"K7QX2M"` name the same room.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Parses user input into a room code.
    pub fn parse(input: &str) -> Result<Self, ProtocolError> {
        let upper = input.trim().to_ascii_uppercase();
        let valid = upper.len() == ROOM_CODE_LEN
            && upper.chars().all(|c| ROOM_CODE_ALPHABET.contains(c));
        if !valid {
            return Err(ProtocolError::InvalidRoomCode(input.to_string()));
        }
        Ok(Self(upper))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RoomCode {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

// ---------------------------------------------------------------------------
// RoomStatus
// ---------------------------------------------------------------------------

/// Lifecycle of a room. Strictly forward:
///
/// ```text
/// WAITING → ACTIVE → FINISHED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomStatus {
    /// Lobby: players join and toggle ready.
    Waiting,
    /// Rounds are being played.
    Active,
    /// All rounds done (or the host ended the game).
    Finished,
}

impl RoomStatus {
    /// Only a lobby accepts new players.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Waiting)
    }

    /// The next status, or `None` from `Finished`.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Waiting => Some(Self::Active),
            Self::Active => Some(Self::Finished),
            Self::Finished => None,
        }
    }

    /// `true` if `target` is the immediate successor of `self`.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target)
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "WAITING"),
            Self::Active => write!(f, "ACTIVE"),
            Self::Finished => write!(f, "FINISHED"),
        }
    }
}

// ---------------------------------------------------------------------------
// RoundStatus
// ---------------------------------------------------------------------------

/// Lifecycle of a single round:
///
/// ```text
/// WAITING → ACTIVE → GUESSING → RESULTS → FINISHED
/// ```
///
/// `GUESSING` is optional; when the engine runs without a reveal delay the
/// round goes straight from `ACTIVE` to `RESULTS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundStatus {
    Waiting,
    Active,
    Guessing,
    Results,
    Finished,
}

impl RoundStatus {
    /// Guesses are accepted in `ACTIVE` and `GUESSING` only.
    pub fn accepts_guesses(&self) -> bool {
        matches!(self, Self::Active | Self::Guessing)
    }

    /// `true` once the round's results are frozen.
    pub fn is_sealed(&self) -> bool {
        matches!(self, Self::Results | Self::Finished)
    }
}

impl fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Waiting => "WAITING",
            Self::Active => "ACTIVE",
            Self::Guessing => "GUESSING",
            Self::Results => "RESULTS",
            Self::Finished => "FINISHED",
        };
        f.write_str(s)
    }
}

/// Which mode produced a game result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    Solo,
    Multiplayer,
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Solo => write!(f, "solo"),
            Self::Multiplayer => write!(f, "multiplayer"),
        }
    }
}

// ---------------------------------------------------------------------------
// RoomSettings
// ---------------------------------------------------------------------------

/// Settings chosen by the host when creating a room.
///
/// Out-of-range values are clamped by [`RoomSettings::validated`] rather
/// than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomSettings {
    /// Maximum members, host included.
    pub max_players: usize,
    /// Number of rounds in a game.
    pub total_rounds: u32,
    /// Seconds a round stays open. `None` means no timer: the round seals
    /// only when every member has guessed or the host closes it.
    pub round_time_limit_secs: Option<u64>,
    /// `true`: the next round starts when the results display elapses.
    /// `false`: the host starts each round.
    pub auto_advance: bool,
    /// Seconds the results of a round stay on screen.
    pub results_display_secs: u64,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            max_players: 8,
            total_rounds: 5,
            round_time_limit_secs: Some(120),
            auto_advance: true,
            results_display_secs: 10,
        }
    }
}

impl RoomSettings {
    pub const MIN_PLAYERS: usize = 2;
    pub const MAX_PLAYERS: usize = 10;
    pub const MIN_ROUNDS: u32 = 1;
    pub const MAX_ROUNDS: u32 = 20;
    pub const MIN_TIME_LIMIT_SECS: u64 = 30;
    pub const MAX_TIME_LIMIT_SECS: u64 = 300;
    pub const MIN_RESULTS_SECS: u64 = 5;
    pub const MAX_RESULTS_SECS: u64 = 60;

    /// Clamps every field into its allowed range.
    pub fn validated(mut self) -> Self {
        let max_players = self
            .max_players
            .clamp(Self::MIN_PLAYERS, Self::MAX_PLAYERS);
        if max_players != self.max_players {
            tracing::warn!(
                requested = self.max_players,
                clamped = max_players,
                "max_players out of range, clamping"
            );
            self.max_players = max_players;
        }

        let total_rounds =
            self.total_rounds.clamp(Self::MIN_ROUNDS, Self::MAX_ROUNDS);
        if total_rounds != self.total_rounds {
            tracing::warn!(
                requested = self.total_rounds,
                clamped = total_rounds,
                "total_rounds out of range, clamping"
            );
            self.total_rounds = total_rounds;
        }

        if let Some(limit) = self.round_time_limit_secs {
            let clamped = limit
                .clamp(Self::MIN_TIME_LIMIT_SECS, Self::MAX_TIME_LIMIT_SECS);
            if clamped != limit {
                tracing::warn!(
                    requested = limit,
                    clamped,
                    "round_time_limit_secs out of range, clamping"
                );
                self.round_time_limit_secs = Some(clamped);
            }
        }

        let results = self
            .results_display_secs
            .clamp(Self::MIN_RESULTS_SECS, Self::MAX_RESULTS_SECS);
        if results != self.results_display_secs {
            tracing::warn!(
                requested = self.results_display_secs,
                clamped = results,
                "results_display_secs out of range, clamping"
            );
            self.results_display_secs = results;
        }

        self
    }

    pub fn round_time_limit(&self) -> Option<Duration> {
        self.round_time_limit_secs.map(Duration::from_secs)
    }

    pub fn results_display(&self) -> Duration {
        Duration::from_secs(self.results_display_secs)
    }
}

// ---------------------------------------------------------------------------
// Read models
// ---------------------------------------------------------------------------

/// One member of a room as seen by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub user_id: UserId,
    pub score: u64,
    pub ready: bool,
    pub is_host: bool,
    pub joined_at: u64,
}

/// Everything a client needs to render a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub code: RoomCode,
    pub host: UserId,
    pub status: RoomStatus,
    pub settings: RoomSettings,
    /// 1-based index of the round in play; 0 before the first round.
    pub current_round: u32,
    /// Status of the current round, if one exists.
    pub round_status: Option<RoundStatus>,
    /// The current round in full, if one exists.
    #[serde(default)]
    pub round: Option<RoundView>,
    /// Members in join order.
    pub players: Vec<PlayerSummary>,
    pub created_at: u64,
}

/// The current round of a room.
///
/// Carries what `RoundStarted` and `RoundResults` announced, so a player
/// who resumes mid-round can pick it up from a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundView {
    pub index: u32,
    pub image_id: String,
    pub status: RoundStatus,
    /// Milliseconds since the Unix epoch.
    pub started_at: u64,
    pub time_limit_secs: Option<u64>,
    /// When a timed round stops taking guesses, in milliseconds since the
    /// Unix epoch.
    pub deadline_at: Option<u64>,
    /// Time left to guess by the server's clock. `None` once sealed or
    /// for untimed rounds.
    pub time_left_ms: Option<u64>,
    pub ended_at: Option<u64>,
    /// Members who have guessed, in join order.
    pub guessed: Vec<UserId>,
    /// The answer. Hidden until the round is sealed.
    pub target: Option<Coordinate>,
    /// Ranked outcomes; empty until the round is sealed.
    pub outcomes: Vec<GuessOutcome>,
}

impl RoundView {
    pub fn has_guessed(&self, user: &UserId) -> bool {
        self.guessed.contains(user)
    }
}

impl RoomSnapshot {
    pub fn player(&self, user: &UserId) -> Option<&PlayerSummary> {
        self.players.iter().find(|p| &p.user_id == user)
    }
}

/// A player's outcome for one round.
///
/// A miss (no guess by the time the round sealed) has no `location`, no
/// `distance_km`, and a score of 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuessOutcome {
    pub user_id: UserId,
    pub round: u32,
    pub location: Option<Coordinate>,
    pub distance_km: Option<f64>,
    pub score: u32,
    pub submitted_at: Option<u64>,
}

impl GuessOutcome {
    pub fn is_miss(&self) -> bool {
        self.location.is_none()
    }
}

/// A row in the running room scoreboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    pub rank: u32,
    pub user_id: UserId,
    pub total_score: u64,
}

/// A row of the global leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user_id: UserId,
    pub best_score: u32,
    pub average_score: f64,
    pub total_games: u64,
    pub best_distance_km: Option<f64>,
    pub last_played: u64,
}

/// A single high-scoring result from the recent past.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentWinner {
    /// `None` for anonymous solo play.
    pub user_id: Option<UserId>,
    pub mode: GameMode,
    pub score: u32,
    pub distance_km: Option<f64>,
    pub played_at: u64,
}

/// Aggregated statistics for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalStats {
    pub user_id: UserId,
    pub total_games: u64,
    pub solo_games: u64,
    pub multiplayer_games: u64,
    pub best_score: u32,
    pub average_score: f64,
    pub best_distance_km: Option<f64>,
    pub average_distance_km: Option<f64>,
    pub total_distance_km: f64,
    pub first_played: Option<u64>,
    pub last_played: Option<u64>,
    pub global_rank: u32,
}

impl PersonalStats {
    /// A zeroed record for a user with no results.
    pub fn empty(user_id: UserId, global_rank: u32) -> Self {
        Self {
            user_id,
            total_games: 0,
            solo_games: 0,
            multiplayer_games: 0,
            best_score: 0,
            average_score: 0.0,
            best_distance_km: None,
            average_distance_km: None,
            total_distance_km: 0.0,
            first_played: None,
            last_played: None,
            global_rank,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_code_parse_uppercases() {
        let code = RoomCode::parse("ab12cd").unwrap();
        assert_eq!(code.as_str(), "AB12CD");
        assert_eq!(code, RoomCode::parse("AB12CD").unwrap());
    }

    #[test]
    fn test_room_code_rejects_ambiguous_characters() {
        assert!(RoomCode::parse("ABCDE0").is_err());
        assert!(RoomCode::parse("ABCDEO").is_err());
        assert!(RoomCode::parse("abcdeo").is_err());
    }

    #[test]
    fn test_room_code_rejects_wrong_length() {
        assert!(RoomCode::parse("ABCDE").is_err());
        assert!(RoomCode::parse("ABCDEFG").is_err());
        assert!(RoomCode::parse("").is_err());
    }

    #[test]
    fn test_room_code_serializes_as_plain_string() {
        let code = RoomCode::parse("K7QX2M").unwrap();
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"K7QX2M\"");
    }

    #[test]
    fn test_alphabet_has_no_ambiguous_glyphs() {
        assert_eq!(ROOM_CODE_ALPHABET.len(), 34);
        assert!(!ROOM_CODE_ALPHABET.contains('O'));
        assert!(!ROOM_CODE_ALPHABET.contains('0'));
    }

    #[test]
    fn test_user_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&UserId::from("alice")).unwrap();
        assert_eq!(json, "\"alice\"");
    }

    #[test]
    fn test_room_status_is_strictly_forward() {
        assert_eq!(RoomStatus::Waiting.next(), Some(RoomStatus::Active));
        assert_eq!(RoomStatus::Active.next(), Some(RoomStatus::Finished));
        assert_eq!(RoomStatus::Finished.next(), None);
        assert!(RoomStatus::Waiting.can_transition_to(RoomStatus::Active));
        assert!(!RoomStatus::Waiting.can_transition_to(RoomStatus::Finished));
        assert!(!RoomStatus::Finished.can_transition_to(RoomStatus::Waiting));
        assert!(!RoomStatus::Active.can_transition_to(RoomStatus::Active));
    }

    #[test]
    fn test_room_status_serializes_uppercase() {
        let json = serde_json::to_string(&RoomStatus::Waiting).unwrap();
        assert_eq!(json, "\"WAITING\"");
        assert_eq!(RoomStatus::Finished.to_string(), "FINISHED");
    }

    #[test]
    fn test_round_status_accepts_guesses() {
        assert!(!RoundStatus::Waiting.accepts_guesses());
        assert!(RoundStatus::Active.accepts_guesses());
        assert!(RoundStatus::Guessing.accepts_guesses());
        assert!(!RoundStatus::Results.accepts_guesses());
        assert!(!RoundStatus::Finished.accepts_guesses());
        assert!(RoundStatus::Results.is_sealed());
    }

    #[test]
    fn test_game_mode_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&GameMode::Multiplayer).unwrap(),
            "\"multiplayer\""
        );
    }

    #[test]
    fn test_settings_validated_clamps() {
        let s = RoomSettings {
            max_players: 50,
            total_rounds: 0,
            round_time_limit_secs: Some(5),
            auto_advance: false,
            results_display_secs: 600,
        }
        .validated();
        assert_eq!(s.max_players, 10);
        assert_eq!(s.total_rounds, 1);
        assert_eq!(s.round_time_limit_secs, Some(30));
        assert_eq!(s.results_display_secs, 60);
        assert!(!s.auto_advance);
    }

    #[test]
    fn test_settings_validated_keeps_untimed_rounds() {
        let s = RoomSettings {
            round_time_limit_secs: None,
            ..RoomSettings::default()
        }
        .validated();
        assert_eq!(s.round_time_limit(), None);
    }

    #[test]
    fn test_settings_deserialize_with_defaults() {
        let s: RoomSettings =
            serde_json::from_str(r#"{"max_players": 2}"#).unwrap();
        assert_eq!(s.max_players, 2);
        assert_eq!(s.total_rounds, RoomSettings::default().total_rounds);
    }
}

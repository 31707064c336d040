//! Durable record types and the result query.

use geoguess_protocol::{
    GameMode, RoomCode, RoomSettings, RoomStatus, UserId,
};
use serde::{Deserialize, Serialize};

/// Durable copy of a room's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRecord {
    pub code: RoomCode,
    pub host: UserId,
    pub status: RoomStatus,
    pub settings: RoomSettings,
    pub current_round: u32,
    pub created_at: u64,
}

/// Durable copy of one room membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRecord {
    pub code: RoomCode,
    pub user_id: UserId,
    pub score: u64,
    pub ready: bool,
    pub joined_at: u64,
}

/// One player's outcome for one round, or one solo guess.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameResult {
    /// `None` for anonymous solo play.
    pub user_id: Option<UserId>,
    /// `None` for solo play.
    pub room: Option<RoomCode>,
    /// 1-based round index; 0 for solo guesses.
    pub round: u32,
    pub mode: GameMode,
    /// `None` when the player never guessed before the round sealed.
    pub distance_km: Option<f64>,
    pub score: u32,
    /// Unix milliseconds.
    pub played_at: u64,
}

/// Ordering applied by [`Store::query_results`](crate::Store::query_results).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultOrder {
    /// Insertion order.
    #[default]
    Appended,
    /// Most recent first.
    Newest,
    /// Highest score first, then shortest distance (misses last), then
    /// most recent.
    ScoreDesc,
}

/// Filter, order, and limit for reading the result log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultQuery {
    pub user: Option<UserId>,
    pub room: Option<RoomCode>,
    pub mode: Option<GameMode>,
    /// Only results with `played_at >= since`.
    pub since: Option<u64>,
    /// Skip anonymous results.
    pub identified_only: bool,
    pub order: ResultOrder,
    pub limit: Option<usize>,
}

impl ResultQuery {
    /// Every result, in insertion order.
    pub fn all() -> Self {
        Self::default()
    }

    /// Every result belonging to `user`.
    pub fn for_user(user: UserId) -> Self {
        Self {
            user: Some(user),
            ..Self::default()
        }
    }

    /// Every result of one room.
    pub fn for_room(room: RoomCode) -> Self {
        Self {
            room: Some(room),
            ..Self::default()
        }
    }

    pub fn since(mut self, since: u64) -> Self {
        self.since = Some(since);
        self
    }

    pub fn identified_only(mut self) -> Self {
        self.identified_only = true;
        self
    }

    pub fn order(mut self, order: ResultOrder) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// `true` if `result` passes every filter of this query.
    pub fn matches(&self, result: &GameResult) -> bool {
        if let Some(user) = &self.user {
            if result.user_id.as_ref() != Some(user) {
                return false;
            }
        }
        if let Some(room) = &self.room {
            if result.room.as_ref() != Some(room) {
                return false;
            }
        }
        if let Some(mode) = self.mode {
            if result.mode != mode {
                return false;
            }
        }
        if let Some(since) = self.since {
            if result.played_at < since {
                return false;
            }
        }
        !(self.identified_only && result.user_id.is_none())
    }
}

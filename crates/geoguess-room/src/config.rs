//! Engine configuration.

use std::time::Duration;

use geoguess_timer::TimerConfig;

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Server-wide knobs for every room the registry spawns.
///
/// Per-room choices (player cap, rounds, time limit) live in
/// [`RoomSettings`](geoguess_protocol::RoomSettings) instead.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Capacity of each room actor's command mailbox. A full mailbox makes
    /// callers wait (backpressure), it never drops commands.
    pub channel_size: usize,

    /// How many random codes to try before giving up on room creation.
    pub code_attempts: u32,

    /// Members required (all ready) before the host can start the game.
    pub min_players_to_start: usize,

    /// When set, a round opens as `ACTIVE` (image shown) and flips to
    /// `GUESSING` after this delay. `None` collapses the two.
    pub reveal_delay: Option<Duration>,

    /// How long a finished room lingers before it is closed. `None` keeps
    /// it until its members leave.
    pub finished_room_ttl: Option<Duration>,

    /// Passed to each room's phase timer.
    pub timer: TimerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            channel_size: 64,
            code_attempts: 10,
            min_players_to_start: 2,
            reveal_delay: None,
            finished_room_ttl: Some(Duration::from_secs(600)),
            timer: TimerConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Clamp values that would wedge the engine.
    pub fn validated(mut self) -> Self {
        if self.channel_size == 0 {
            tracing::warn!("channel_size 0 is not allowed, using 1");
            self.channel_size = 1;
        }
        if self.code_attempts == 0 {
            tracing::warn!("code_attempts 0 is not allowed, using 1");
            self.code_attempts = 1;
        }
        if self.min_players_to_start == 0 {
            self.min_players_to_start = 1;
        }
        if self.reveal_delay == Some(Duration::ZERO) {
            self.reveal_delay = None;
        }
        self
    }
}

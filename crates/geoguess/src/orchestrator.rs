//! Binds client events to room, round, and stats operations.
//!
//! Room actors emit every event about their room themselves, the
//! requester's own confirmation included, so the orchestrator only replies
//! directly to requests that sit outside any room's event stream: room
//! creation, snapshots, solo guesses, statistics, heartbeats, and errors.

use std::sync::Arc;
use std::time::Duration;

use geoguess_geo::{score, Coordinate};
use geoguess_protocol::{
    now_millis, ClientEvent, GameMode, Outbox, ProtocolError, RoomStatus,
    ServerEvent, UserId,
};
use geoguess_room::{EngineConfig, RoomRegistry, TargetSource};
use geoguess_stats::{StatsAggregator, DEFAULT_LIMIT, DEFAULT_WINDOW};
use geoguess_store::{GameResult, Store};

use crate::GeoguessError;

/// The multiplayer engine as seen from a connection.
pub struct Orchestrator<S: Store> {
    rooms: RoomRegistry<S>,
    stats: StatsAggregator<S>,
    outbox: Arc<dyn Outbox>,
}

impl<S: Store> Orchestrator<S> {
    pub fn new(
        store: Arc<S>,
        outbox: Arc<dyn Outbox>,
        targets: Arc<dyn TargetSource>,
        config: EngineConfig,
    ) -> Self {
        Self {
            rooms: RoomRegistry::new(
                Arc::clone(&store),
                Arc::clone(&outbox),
                targets,
                config,
            ),
            stats: StatsAggregator::new(store),
            outbox,
        }
    }

    pub fn rooms(&self) -> &RoomRegistry<S> {
        &self.rooms
    }

    pub fn stats(&self) -> &StatsAggregator<S> {
        &self.stats
    }

    /// Runs one client request and delivers its direct reply, or the
    /// error, to `user` through the outbox.
    pub async fn handle_event(&self, user: &UserId, event: ClientEvent) {
        match self.dispatch(user, event).await {
            Ok(Some(reply)) => self.outbox.send_to_player(user, reply),
            Ok(None) => {}
            Err(e) => {
                tracing::debug!(%user, error = %e, "request failed");
                self.outbox.send_to_player(user, error_event(&e));
            }
        }
    }

    /// Runs one client request.
    ///
    /// Returns the direct reply, if the request has one. Room requests
    /// return `None`: their confirmation arrives through the room's own
    /// event stream.
    pub async fn dispatch(
        &self,
        user: &UserId,
        event: ClientEvent,
    ) -> Result<Option<ServerEvent>, GeoguessError> {
        let reply = match event {
            ClientEvent::Heartbeat { client_time } => {
                Some(ServerEvent::HeartbeatAck {
                    client_time,
                    server_time: now_millis(),
                })
            }
            ClientEvent::Hello { .. } | ClientEvent::Disconnect { .. } => {
                return Err(ProtocolError::InvalidMessage(
                    "connection control frame outside the handshake".into(),
                )
                .into());
            }

            ClientEvent::CreateRoom { settings } => {
                let room = self.rooms.create_room(user.clone(), settings).await?;
                Some(ServerEvent::RoomState { room })
            }
            ClientEvent::JoinRoom { code } => {
                self.rooms.join_room(&code, user.clone()).await?;
                None
            }
            ClientEvent::LeaveRoom { code } => {
                self.rooms.leave_room(&code, user.clone()).await?;
                None
            }
            ClientEvent::SetReady { code, ready } => {
                self.rooms.set_ready(&code, user.clone(), ready).await?;
                None
            }
            ClientEvent::GetRoom { code } => {
                let room = self.rooms.snapshot(&code).await?;
                Some(ServerEvent::RoomState { room })
            }

            ClientEvent::StartGame { code } => {
                self.rooms
                    .update_status(&code, user.clone(), RoomStatus::Active)
                    .await?;
                None
            }
            ClientEvent::EndGame { code } => {
                self.rooms
                    .update_status(&code, user.clone(), RoomStatus::Finished)
                    .await?;
                None
            }
            ClientEvent::NextRound { code } => {
                self.rooms.advance_round(&code, user.clone()).await?;
                None
            }
            ClientEvent::CloseRound { code } => {
                self.rooms.close_round(&code, user.clone()).await?;
                None
            }

            ClientEvent::SubmitGuess {
                code,
                round,
                location,
            } => {
                self.rooms
                    .submit_guess(&code, user.clone(), round, location)
                    .await?;
                None
            }
            ClientEvent::SoloGuess { target, location } => {
                let result =
                    self.solo_guess(Some(user.clone()), target, location).await?;
                Some(ServerEvent::SoloResult {
                    distance_km: result.distance_km.unwrap_or_default(),
                    score: result.score,
                })
            }

            ClientEvent::Leaderboard { limit } => {
                let entries = self
                    .stats
                    .leaderboard(limit.unwrap_or(DEFAULT_LIMIT))
                    .await?;
                Some(ServerEvent::Leaderboard { entries })
            }
            ClientEvent::RecentWinners {
                window_hours,
                limit,
            } => {
                let window = match window_hours {
                    Some(hours) if hours > 0 => {
                        Duration::from_secs(hours.saturating_mul(3600))
                    }
                    _ => DEFAULT_WINDOW,
                };
                let entries = self
                    .stats
                    .recent_winners(window, limit.unwrap_or(DEFAULT_LIMIT))
                    .await?;
                Some(ServerEvent::RecentWinners { entries })
            }
            ClientEvent::MyStats => {
                let stats = self.stats.personal_stats(user).await?;
                Some(ServerEvent::PersonalStats { stats })
            }
        };
        Ok(reply)
    }

    /// Scores one solo guess and records it. `user` is `None` for
    /// anonymous play.
    ///
    /// Unlike round results, a solo result that can't be stored is an
    /// error: recording it is the whole request.
    pub async fn solo_guess(
        &self,
        user: Option<UserId>,
        target: Coordinate,
        guess: Coordinate,
    ) -> Result<GameResult, GeoguessError> {
        let target = target.validated()?;
        let guess = guess.validated()?;
        let distance = target.distance_km(&guess);

        let result = GameResult {
            user_id: user,
            room: None,
            round: 0,
            mode: GameMode::Solo,
            distance_km: Some(distance),
            score: score(distance),
            played_at: now_millis(),
        };
        self.rooms.store().append_game_result(&result).await?;
        tracing::debug!(
            user = ?result.user_id,
            distance_km = distance,
            score = result.score,
            "solo guess recorded"
        );
        Ok(result)
    }

    /// Stops every room actor.
    pub async fn shutdown(&self) {
        self.rooms.shutdown().await;
    }
}

/// The wire form of a failed request.
pub fn error_event(err: &GeoguessError) -> ServerEvent {
    ServerEvent::Error {
        kind: err.kind(),
        message: err.to_string(),
    }
}

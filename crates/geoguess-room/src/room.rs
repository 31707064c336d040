//! Room actor: an isolated Tokio task that owns one room and its rounds.
//!
//! Every membership change, guess, and timer expiry for a room goes
//! through this task's mailbox, one at a time. That serialization is what
//! makes the round seal safe: the guess that completes a round and the
//! deadline that times it out can't both win, because whichever is
//! processed second sees a sealed round and does nothing.
//!
//! The actor also emits every event for its room through the [`Outbox`],
//! including the confirmation to the member who asked. Events for one room
//! therefore reach each player in the order the actor produced them.

use std::sync::Arc;

use geoguess_geo::Coordinate;
use geoguess_protocol::{
    CloseReason, GameMode, GuessOutcome, Outbox, PlayerSummary, Recipient,
    RoomCode, RoomSettings, RoomSnapshot, RoomStatus, RoundStatus, ServerEvent,
    Standing, UserId, now_millis,
};
use geoguess_store::{GameResult, MembershipRecord, RoomRecord, Store};
use geoguess_timer::PhaseTimer;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::registry::RoomTable;
use crate::round::{self, Round};
use crate::{EngineConfig, RoomError, TargetSource};

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

type Reply<T> = oneshot::Sender<Result<T, RoomError>>;

/// Commands sent to a room actor through its channel.
pub(crate) enum RoomCommand {
    Join {
        user: UserId,
        reply: Reply<RoomSnapshot>,
    },
    Leave {
        user: UserId,
        reply: Reply<LeaveOutcome>,
    },
    SetReady {
        user: UserId,
        ready: bool,
        reply: Reply<RoomSnapshot>,
    },
    UpdateStatus {
        requester: UserId,
        status: RoomStatus,
        reply: Reply<RoomSnapshot>,
    },
    AdvanceRound {
        requester: UserId,
        reply: Reply<RoomSnapshot>,
    },
    CloseRound {
        requester: UserId,
        reply: Reply<RoomSnapshot>,
    },
    SubmitGuess {
        user: UserId,
        round: u32,
        location: Coordinate,
        reply: Reply<GuessOutcome>,
    },
    Snapshot {
        reply: oneshot::Sender<RoomSnapshot>,
    },
    /// Stop the actor without touching the store.
    Shutdown,
}

/// What happened to the room when a member left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// `true` if the leaver was the host or the last member.
    pub room_deleted: bool,
}

// ---------------------------------------------------------------------------
// RoomHandle
// ---------------------------------------------------------------------------

/// Handle to a running room actor. Cheap to clone.
#[derive(Clone)]
pub struct RoomHandle {
    code: RoomCode,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// `false` once the actor has stopped.
    pub fn is_alive(&self) -> bool {
        !self.sender.is_closed()
    }

    pub async fn join(&self, user: UserId) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::Join { user, reply }).await
    }

    pub async fn leave(&self, user: UserId) -> Result<LeaveOutcome, RoomError> {
        self.request(|reply| RoomCommand::Leave { user, reply }).await
    }

    pub async fn set_ready(
        &self,
        user: UserId,
        ready: bool,
    ) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::SetReady { user, ready, reply })
            .await
    }

    pub async fn update_status(
        &self,
        requester: UserId,
        status: RoomStatus,
    ) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::UpdateStatus {
            requester,
            status,
            reply,
        })
        .await
    }

    pub async fn advance_round(
        &self,
        requester: UserId,
    ) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::AdvanceRound { requester, reply })
            .await
    }

    pub async fn close_round(
        &self,
        requester: UserId,
    ) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::CloseRound { requester, reply })
            .await
    }

    pub async fn submit_guess(
        &self,
        user: UserId,
        round: u32,
        location: Coordinate,
    ) -> Result<GuessOutcome, RoomError> {
        self.request(|reply| RoomCommand::SubmitGuess {
            user,
            round,
            location,
            reply,
        })
        .await
    }

    pub async fn snapshot(&self) -> Result<RoomSnapshot, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Snapshot { reply: reply_tx })
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))
    }

    /// Tells the actor to stop. Store records are left alone.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))?
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// Deadlines a room can be waiting on. Round-scoped phases carry the round
/// index so a deadline from an earlier round can be recognised as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    /// `ACTIVE → GUESSING` for this round.
    Reveal(u32),
    /// The round's time limit.
    Deadline(u32),
    /// End of the results display.
    Results(u32),
    /// A finished room has idled long enough.
    Expire,
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

#[derive(Debug, Clone)]
struct Member {
    user_id: UserId,
    score: u64,
    ready: bool,
    joined_at: u64,
}

/// Everything a new actor starts with.
pub(crate) struct RoomSeed {
    pub code: RoomCode,
    pub host: UserId,
    pub settings: RoomSettings,
    pub created_at: u64,
}

/// Collaborators shared by every room.
pub(crate) struct RoomContext<S> {
    pub store: Arc<S>,
    pub outbox: Arc<dyn Outbox>,
    pub targets: Arc<dyn TargetSource>,
    pub config: EngineConfig,
    pub table: Arc<RoomTable>,
}

impl<S> Clone for RoomContext<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            outbox: Arc::clone(&self.outbox),
            targets: Arc::clone(&self.targets),
            config: self.config.clone(),
            table: Arc::clone(&self.table),
        }
    }
}

struct RoomActor<S> {
    code: RoomCode,
    host: UserId,
    status: RoomStatus,
    settings: RoomSettings,
    created_at: u64,
    current_round: u32,
    /// Join order.
    members: Vec<Member>,
    round: Option<Round>,
    /// Absolute guess deadline of the open round, kept across the reveal
    /// phase so the time limit counts from round start.
    round_deadline: Option<Instant>,
    timer: PhaseTimer<Phase>,
    ctx: RoomContext<S>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl<S: Store> RoomActor<S> {
    async fn run(mut self) {
        tracing::info!(room = %self.code, host = %self.host, "room actor started");

        loop {
            let flow = tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => Flow::Stop,
                },
                expiry = self.timer.expired() => {
                    self.handle_expiry(expiry.phase).await
                }
            };
            if flow == Flow::Stop {
                break;
            }
        }

        tracing::info!(room = %self.code, "room actor stopped");
    }

    async fn handle_command(&mut self, cmd: RoomCommand) -> Flow {
        match cmd {
            RoomCommand::Join { user, reply } => {
                let result = self.handle_join(user).await;
                let _ = reply.send(result);
            }
            RoomCommand::Leave { user, reply } => {
                return match self.handle_leave(user).await {
                    Ok(outcome) => {
                        let _ = reply.send(Ok(outcome));
                        if outcome.room_deleted {
                            Flow::Stop
                        } else {
                            Flow::Continue
                        }
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e));
                        Flow::Continue
                    }
                };
            }
            RoomCommand::SetReady { user, ready, reply } => {
                let result = self.handle_set_ready(user, ready).await;
                let _ = reply.send(result);
            }
            RoomCommand::UpdateStatus {
                requester,
                status,
                reply,
            } => {
                let result = self.handle_update_status(requester, status).await;
                let _ = reply.send(result);
            }
            RoomCommand::AdvanceRound { requester, reply } => {
                let result = self.handle_advance(requester).await;
                let _ = reply.send(result);
            }
            RoomCommand::CloseRound { requester, reply } => {
                let result = self.handle_close_round(requester).await;
                let _ = reply.send(result);
            }
            RoomCommand::SubmitGuess {
                user,
                round,
                location,
                reply,
            } => {
                let result = self.handle_guess(user, round, location).await;
                let _ = reply.send(result);
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            RoomCommand::Shutdown => {
                tracing::info!(room = %self.code, "room shutting down");
                self.timer.cancel();
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    // -- Membership ---------------------------------------------------------

    async fn handle_join(&mut self, user: UserId) -> Result<RoomSnapshot, RoomError> {
        if !self.status.is_joinable() {
            return Err(RoomError::InvalidState(format!(
                "cannot join a room in status {}",
                self.status
            )));
        }
        if self.member(&user).is_some() {
            return Err(RoomError::AlreadyMember(user, self.code.clone()));
        }
        if self.members.len() >= self.settings.max_players {
            return Err(RoomError::RoomFull(self.code.clone()));
        }

        let member = Member {
            user_id: user.clone(),
            score: 0,
            ready: false,
            joined_at: now_millis(),
        };
        self.members.push(member.clone());
        tracing::info!(
            room = %self.code,
            %user,
            players = self.members.len(),
            "player joined"
        );
        self.persist_new_member(&member).await;

        let snapshot = self.snapshot();
        self.dispatch(
            Recipient::Player(user.clone()),
            ServerEvent::RoomState {
                room: snapshot.clone(),
            },
        );
        self.dispatch(
            Recipient::AllExcept(user.clone()),
            ServerEvent::PlayerJoined {
                code: self.code.clone(),
                player: self.summary(&member),
            },
        );
        Ok(snapshot)
    }

    async fn handle_leave(&mut self, user: UserId) -> Result<LeaveOutcome, RoomError> {
        let Some(pos) = self.members.iter().position(|m| m.user_id == user) else {
            return Err(RoomError::NotMember(user, self.code.clone()));
        };
        self.members.remove(pos);
        tracing::info!(
            room = %self.code,
            %user,
            players = self.members.len(),
            "player left"
        );

        if user == self.host || self.members.is_empty() {
            let reason = if user == self.host {
                CloseReason::HostLeft
            } else {
                CloseReason::Empty
            };
            self.close_room(reason).await;
            self.dispatch(
                Recipient::Player(user),
                ServerEvent::LeftRoom {
                    code: self.code.clone(),
                    room_deleted: true,
                },
            );
            return Ok(LeaveOutcome { room_deleted: true });
        }

        if let Err(e) = self.ctx.store.delete_membership(&self.code, &user).await {
            tracing::warn!(room = %self.code, %user, error = %e, "failed to delete membership");
        }
        self.dispatch(
            Recipient::Player(user.clone()),
            ServerEvent::LeftRoom {
                code: self.code.clone(),
                room_deleted: false,
            },
        );
        self.dispatch(
            Recipient::All,
            ServerEvent::PlayerLeft {
                code: self.code.clone(),
                user_id: user,
            },
        );

        // The leaver may have been the last one the round was waiting on.
        if self.round_accepting() && self.everyone_guessed() {
            self.seal_and_schedule().await;
        }
        Ok(LeaveOutcome {
            room_deleted: false,
        })
    }

    async fn handle_set_ready(
        &mut self,
        user: UserId,
        ready: bool,
    ) -> Result<RoomSnapshot, RoomError> {
        if self.status != RoomStatus::Waiting {
            return Err(RoomError::InvalidState(format!(
                "cannot change readiness in status {}",
                self.status
            )));
        }
        let code = self.code.clone();
        let Some(member) = self.members.iter_mut().find(|m| m.user_id == user) else {
            return Err(RoomError::NotMember(user, code));
        };
        member.ready = ready;
        let member = member.clone();
        tracing::debug!(room = %self.code, %user, ready, "ready changed");
        self.persist_member(&member).await;

        self.dispatch(
            Recipient::All,
            ServerEvent::ReadyChanged {
                code: self.code.clone(),
                user_id: user,
                ready,
            },
        );
        Ok(self.snapshot())
    }

    // -- Room status ----------------------------------------------------------

    async fn handle_update_status(
        &mut self,
        requester: UserId,
        target: RoomStatus,
    ) -> Result<RoomSnapshot, RoomError> {
        self.require_host(&requester, "change the room status")?;
        if !self.status.can_transition_to(target) {
            return Err(RoomError::InvalidState(format!(
                "cannot move room from {} to {}",
                self.status, target
            )));
        }

        match target {
            RoomStatus::Active => self.start_game().await?,
            RoomStatus::Finished => {
                if self.round_accepting() {
                    self.seal_round().await;
                }
                self.finish_game().await;
            }
            RoomStatus::Waiting => {}
        }
        Ok(self.snapshot())
    }

    async fn start_game(&mut self) -> Result<(), RoomError> {
        let needed = self.ctx.config.min_players_to_start;
        if self.members.len() < needed {
            return Err(RoomError::InvalidState(format!(
                "need at least {needed} players to start, have {}",
                self.members.len()
            )));
        }
        if let Some(waiting) = self.members.iter().find(|m| !m.ready) {
            return Err(RoomError::InvalidState(format!(
                "player {} is not ready",
                waiting.user_id
            )));
        }

        self.status = RoomStatus::Active;
        tracing::info!(
            room = %self.code,
            players = self.members.len(),
            rounds = self.settings.total_rounds,
            "game started"
        );
        self.dispatch(
            Recipient::All,
            ServerEvent::GameStarted {
                code: self.code.clone(),
                total_rounds: self.settings.total_rounds,
            },
        );
        self.start_round(1).await;
        Ok(())
    }

    async fn finish_game(&mut self) {
        self.timer.cancel();
        self.round_deadline = None;
        if let Some(round) = self.round.as_mut() {
            round.finish();
        }
        self.status = RoomStatus::Finished;
        self.persist_room().await;

        let standings = self.standings();
        tracing::info!(
            room = %self.code,
            rounds_played = self.current_round,
            winner = ?standings.first().map(|s| &s.user_id),
            "game finished"
        );
        self.dispatch(
            Recipient::All,
            ServerEvent::GameFinished {
                code: self.code.clone(),
                standings,
            },
        );

        if let Some(ttl) = self.ctx.config.finished_room_ttl {
            self.timer.arm(Phase::Expire, ttl);
        }
    }

    /// Deletes the room: table entry, store records, and tells whoever is
    /// still a member.
    async fn close_room(&mut self, reason: CloseReason) {
        self.timer.cancel();
        self.ctx.table.write().await.remove(&self.code);
        if let Err(e) = self.ctx.store.delete_room(&self.code).await {
            tracing::warn!(room = %self.code, error = %e, "failed to delete room record");
        }
        tracing::info!(room = %self.code, ?reason, "room closed");
        self.dispatch(
            Recipient::All,
            ServerEvent::RoomClosed {
                code: self.code.clone(),
                reason,
            },
        );
    }

    // -- Rounds ---------------------------------------------------------------

    async fn handle_advance(&mut self, requester: UserId) -> Result<RoomSnapshot, RoomError> {
        self.require_host(&requester, "advance the round")?;
        if self.status != RoomStatus::Active {
            return Err(RoomError::InvalidState(format!(
                "cannot advance a room in status {}",
                self.status
            )));
        }
        if let Some(round) = &self.round {
            if !round.status.is_sealed() {
                return Err(RoomError::InvalidState(format!(
                    "round {} is still {}",
                    round.index, round.status
                )));
            }
        }

        if self.current_round >= self.settings.total_rounds {
            self.finish_game().await;
        } else {
            if let Some(round) = self.round.as_mut() {
                round.finish();
            }
            self.start_round(self.current_round + 1).await;
        }
        Ok(self.snapshot())
    }

    async fn handle_close_round(&mut self, requester: UserId) -> Result<RoomSnapshot, RoomError> {
        self.require_host(&requester, "close the round")?;
        if !self.round_accepting() {
            return Err(RoomError::InvalidState(
                "no round is accepting guesses".into(),
            ));
        }
        self.seal_and_schedule().await;
        Ok(self.snapshot())
    }

    async fn handle_guess(
        &mut self,
        user: UserId,
        round_index: u32,
        location: Coordinate,
    ) -> Result<GuessOutcome, RoomError> {
        if self.member(&user).is_none() {
            return Err(RoomError::NotMember(user, self.code.clone()));
        }
        let code = self.code.clone();
        let round = match self.round.as_mut() {
            Some(round) if round.index == round_index => round,
            Some(round) if round_index < round.index => {
                return Err(RoomError::InvalidState(format!(
                    "round {round_index} is closed"
                )));
            }
            _ => {
                return Err(RoomError::RoundNotFound {
                    code,
                    round: round_index,
                });
            }
        };

        let outcome = round.submit(&user, location, now_millis())?;
        tracing::debug!(
            room = %self.code,
            %user,
            round = round_index,
            distance_km = outcome.distance_km.unwrap_or_default(),
            score = outcome.score,
            "guess accepted"
        );

        self.dispatch(
            Recipient::Player(user.clone()),
            ServerEvent::GuessAccepted {
                code: self.code.clone(),
                outcome: outcome.clone(),
            },
        );
        self.dispatch(
            Recipient::AllExcept(user.clone()),
            ServerEvent::PlayerGuessed {
                code: self.code.clone(),
                round: round_index,
                user_id: user,
            },
        );

        if self.everyone_guessed() {
            self.seal_and_schedule().await;
        }
        Ok(outcome)
    }

    async fn start_round(&mut self, index: u32) {
        let target = self.ctx.targets.next_target(&self.code, index);
        let time_limit = self.settings.round_time_limit();
        let mut round = Round::open(index, target, time_limit, now_millis());

        self.timer.cancel();
        let now = Instant::now();
        self.round_deadline = time_limit.map(|limit| now + limit);

        match (self.ctx.config.reveal_delay, self.round_deadline) {
            (Some(delay), Some(deadline)) if now + delay < deadline => {
                self.timer.arm(Phase::Reveal(index), delay);
            }
            (Some(delay), None) => self.timer.arm(Phase::Reveal(index), delay),
            (_, Some(deadline)) => {
                // Reveal would land after the deadline; open the map now.
                if self.ctx.config.reveal_delay.is_some() {
                    round.open_guessing();
                }
                self.timer.arm_at(Phase::Deadline(index), deadline);
            }
            (None, None) => {}
        }

        let status = round.status;
        let image_id = round.target.image_id.clone();
        self.round = Some(round);
        self.current_round = index;
        self.persist_room().await;

        tracing::info!(
            room = %self.code,
            round = index,
            total = self.settings.total_rounds,
            %image_id,
            "round started"
        );
        self.dispatch(
            Recipient::All,
            ServerEvent::RoundStarted {
                code: self.code.clone(),
                round: index,
                total_rounds: self.settings.total_rounds,
                image_id,
                time_limit_secs: time_limit.map(|d| d.as_secs()),
                status,
            },
        );
    }

    /// Seals the open round and schedules the end of the results display.
    async fn seal_and_schedule(&mut self) {
        if let Some(index) = self.seal_round().await {
            self.timer
                .arm(Phase::Results(index), self.settings.results_display());
        }
    }

    /// Closes the open round: misses for everyone who didn't guess, totals
    /// updated, one result written per member, results broadcast.
    ///
    /// Returns the sealed round's index, or `None` if there was nothing to
    /// seal.
    async fn seal_round(&mut self) -> Option<u32> {
        let member_ids: Vec<UserId> =
            self.members.iter().map(|m| m.user_id.clone()).collect();
        let round = self.round.as_mut()?;
        let outcomes = round.seal(&member_ids, now_millis())?;
        let index = round.index;
        let target = round.target.clone();
        let played_at = round.ended_at.unwrap_or_else(now_millis);

        self.timer.cancel();
        self.round_deadline = None;

        for outcome in &outcomes {
            if let Some(member) =
                self.members.iter_mut().find(|m| m.user_id == outcome.user_id)
            {
                member.score += u64::from(outcome.score);
            }
        }

        for outcome in &outcomes {
            let result = GameResult {
                user_id: Some(outcome.user_id.clone()),
                room: Some(self.code.clone()),
                round: index,
                mode: GameMode::Multiplayer,
                distance_km: outcome.distance_km,
                score: outcome.score,
                played_at,
            };
            if let Err(e) = self.ctx.store.append_game_result(&result).await {
                tracing::error!(
                    room = %self.code,
                    round = index,
                    user = %outcome.user_id,
                    error = %e,
                    "failed to record game result"
                );
            }
        }
        for member in self.members.clone() {
            self.persist_member(&member).await;
        }

        tracing::info!(
            room = %self.code,
            round = index,
            guesses = outcomes.iter().filter(|o| !o.is_miss()).count(),
            misses = outcomes.iter().filter(|o| o.is_miss()).count(),
            "round sealed"
        );
        self.dispatch(
            Recipient::All,
            ServerEvent::RoundResults {
                code: self.code.clone(),
                round: index,
                target: target.location,
                image_id: target.image_id,
                outcomes,
                standings: self.standings(),
            },
        );
        Some(index)
    }

    // -- Timers ---------------------------------------------------------------

    async fn handle_expiry(&mut self, phase: Phase) -> Flow {
        match phase {
            Phase::Reveal(index) => {
                let Some(round) = self.round.as_mut().filter(|r| r.index == index) else {
                    tracing::debug!(room = %self.code, ?phase, "stale deadline ignored");
                    return Flow::Continue;
                };
                if round.open_guessing() {
                    if let Some(deadline) = self.round_deadline {
                        self.timer.arm_at(Phase::Deadline(index), deadline);
                    }
                    self.dispatch(
                        Recipient::All,
                        ServerEvent::GuessingOpened {
                            code: self.code.clone(),
                            round: index,
                        },
                    );
                }
            }
            Phase::Deadline(index) => {
                if self.current_round == index && self.round_accepting() {
                    tracing::info!(room = %self.code, round = index, "round timed out");
                    self.seal_and_schedule().await;
                } else {
                    tracing::debug!(room = %self.code, ?phase, "stale deadline ignored");
                }
            }
            Phase::Results(index) => {
                let showing = self.status == RoomStatus::Active
                    && self.round.as_ref().is_some_and(|r| {
                        r.index == index && r.status == RoundStatus::Results
                    });
                if showing {
                    self.after_results(index).await;
                } else {
                    tracing::debug!(room = %self.code, ?phase, "stale deadline ignored");
                }
            }
            Phase::Expire => {
                if self.status == RoomStatus::Finished {
                    self.close_room(CloseReason::Expired).await;
                    return Flow::Stop;
                }
            }
        }
        Flow::Continue
    }

    async fn after_results(&mut self, index: u32) {
        if index >= self.settings.total_rounds {
            self.finish_game().await;
            return;
        }
        if let Some(round) = self.round.as_mut() {
            round.finish();
        }
        if self.settings.auto_advance {
            self.start_round(index + 1).await;
        } else {
            tracing::debug!(room = %self.code, round = index, "waiting for host to advance");
            self.dispatch(
                Recipient::All,
                ServerEvent::RoundFinished {
                    code: self.code.clone(),
                    round: index,
                },
            );
        }
    }

    // -- Helpers --------------------------------------------------------------

    fn require_host(&self, requester: &UserId, action: &str) -> Result<(), RoomError> {
        if self.member(requester).is_none() {
            return Err(RoomError::NotMember(requester.clone(), self.code.clone()));
        }
        if *requester != self.host {
            return Err(RoomError::NotHost(action.to_string()));
        }
        Ok(())
    }

    fn member(&self, user: &UserId) -> Option<&Member> {
        self.members.iter().find(|m| m.user_id == *user)
    }

    fn round_accepting(&self) -> bool {
        self.round
            .as_ref()
            .is_some_and(|r| r.status.accepts_guesses())
    }

    fn everyone_guessed(&self) -> bool {
        self.round.as_ref().is_some_and(|r| {
            r.status.accepts_guesses()
                && r.all_guessed(self.members.iter().map(|m| &m.user_id))
        })
    }

    fn standings(&self) -> Vec<Standing> {
        round::standings(self.members.iter().map(|m| (&m.user_id, m.score)))
    }

    fn summary(&self, member: &Member) -> PlayerSummary {
        PlayerSummary {
            user_id: member.user_id.clone(),
            score: member.score,
            ready: member.ready,
            is_host: member.user_id == self.host,
            joined_at: member.joined_at,
        }
    }

    fn snapshot(&self) -> RoomSnapshot {
        let member_ids: Vec<UserId> =
            self.members.iter().map(|m| m.user_id.clone()).collect();
        let time_left = self
            .round_deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()));
        RoomSnapshot {
            code: self.code.clone(),
            host: self.host.clone(),
            status: self.status,
            settings: self.settings.clone(),
            current_round: self.current_round,
            round_status: self.round.as_ref().map(|r| r.status),
            round: self.round.as_ref().map(|r| r.view(&member_ids, time_left)),
            players: self.members.iter().map(|m| self.summary(m)).collect(),
            created_at: self.created_at,
        }
    }

    /// Resolves a recipient against the current members and hands the
    /// event to the outbox.
    fn dispatch(&self, recipient: Recipient, event: ServerEvent) {
        match recipient {
            Recipient::All => {
                let members: Vec<UserId> =
                    self.members.iter().map(|m| m.user_id.clone()).collect();
                self.ctx.outbox.broadcast_to_room(&self.code, &members, &event);
            }
            Recipient::Player(user) => {
                self.ctx.outbox.send_to_player(&user, event);
            }
            Recipient::AllExcept(excluded) => {
                let members: Vec<UserId> = self
                    .members
                    .iter()
                    .filter(|m| m.user_id != excluded)
                    .map(|m| m.user_id.clone())
                    .collect();
                self.ctx.outbox.broadcast_to_room(&self.code, &members, &event);
            }
        }
    }

    fn room_record(&self) -> RoomRecord {
        RoomRecord {
            code: self.code.clone(),
            host: self.host.clone(),
            status: self.status,
            settings: self.settings.clone(),
            current_round: self.current_round,
            created_at: self.created_at,
        }
    }

    fn membership_record(&self, member: &Member) -> MembershipRecord {
        MembershipRecord {
            code: self.code.clone(),
            user_id: member.user_id.clone(),
            score: member.score,
            ready: member.ready,
            joined_at: member.joined_at,
        }
    }

    async fn persist_room(&self) {
        if let Err(e) = self.ctx.store.update_room(&self.room_record()).await {
            tracing::warn!(room = %self.code, error = %e, "failed to update room record");
        }
    }

    async fn persist_new_member(&self, member: &Member) {
        let record = self.membership_record(member);
        if let Err(e) = self.ctx.store.create_membership(&record).await {
            tracing::warn!(room = %self.code, user = %member.user_id, error = %e, "failed to record membership");
        }
    }

    async fn persist_member(&self, member: &Member) {
        let record = self.membership_record(member);
        if let Err(e) = self.ctx.store.update_membership(&record).await {
            tracing::warn!(room = %self.code, user = %member.user_id, error = %e, "failed to update membership");
        }
    }
}

// ---------------------------------------------------------------------------
// Spawning
// ---------------------------------------------------------------------------

/// Spawns a room actor whose only member is the (ready) host.
///
/// `channel_size` controls backpressure: if the mailbox fills up,
/// senders wait.
pub(crate) fn spawn_room<S: Store>(seed: RoomSeed, ctx: RoomContext<S>) -> RoomHandle {
    let (tx, rx) = mpsc::channel(ctx.config.channel_size);
    let host = Member {
        user_id: seed.host.clone(),
        score: 0,
        ready: true,
        joined_at: seed.created_at,
    };

    let actor = RoomActor {
        code: seed.code.clone(),
        host: seed.host,
        status: RoomStatus::Waiting,
        settings: seed.settings,
        created_at: seed.created_at,
        current_round: 0,
        members: vec![host],
        round: None,
        round_deadline: None,
        timer: PhaseTimer::new(ctx.config.timer.clone()),
        ctx,
        receiver: rx,
    };

    tokio::spawn(actor.run());

    RoomHandle {
        code: seed.code,
        sender: tx,
    }
}

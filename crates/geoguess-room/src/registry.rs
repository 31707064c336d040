//! Room registry: allocates codes, spawns room actors, and routes requests
//! to them by code.

use std::collections::HashMap;
use std::sync::Arc;

use geoguess_geo::Coordinate;
use geoguess_protocol::{
    GuessOutcome, Outbox, RoomCode, RoomSettings, RoomSnapshot, RoomStatus,
    UserId, now_millis,
};
use geoguess_store::{MembershipRecord, RoomRecord, Store};
use tokio::sync::RwLock;

use crate::room::{RoomContext, RoomSeed, spawn_room};
use crate::{
    EngineConfig, LeaveOutcome, RoomCodeGenerator, RoomError, RoomHandle,
    TargetSource,
};

/// Live rooms by code. Holds handles only; room state lives in the actors.
pub(crate) type RoomTable = RwLock<HashMap<RoomCode, RoomHandle>>;

/// Entry point for room operations from the orchestrator.
///
/// Lookups take the table's read lock just long enough to clone a handle,
/// then talk to the actor with no lock held, so a slow room never blocks
/// requests for another. Actors remove their own entry when their room is
/// deleted.
pub struct RoomRegistry<S: Store> {
    ctx: RoomContext<S>,
    codes: RoomCodeGenerator,
}

impl<S: Store> RoomRegistry<S> {
    pub fn new(
        store: Arc<S>,
        outbox: Arc<dyn Outbox>,
        targets: Arc<dyn TargetSource>,
        config: EngineConfig,
    ) -> Self {
        let config = config.validated();
        let codes = RoomCodeGenerator::new(config.code_attempts);
        Self {
            ctx: RoomContext {
                store,
                outbox,
                targets,
                config,
                table: Arc::new(RwLock::new(HashMap::new())),
            },
            codes,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.ctx.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.ctx.config
    }

    /// Creates a room with `host` as its first (ready) member.
    ///
    /// Settings are clamped to their allowed ranges. A drawn code is
    /// skipped if a live room or a stored room record already holds it. If
    /// the room or host membership can't be persisted, the room is torn
    /// down again and the store error is returned.
    pub async fn create_room(
        &self,
        host: UserId,
        settings: RoomSettings,
    ) -> Result<RoomSnapshot, RoomError> {
        let settings = settings.validated();
        let created_at = now_millis();

        let handle = {
            // Held across the store lookups so concurrent creations can't
            // draw the same code.
            let mut table = self.ctx.table.write().await;
            let live = &*table;
            let store = &self.ctx.store;
            let code = self
                .codes
                .generate_async(move |code| async move {
                    if live.contains_key(&code) {
                        return Ok(true);
                    }
                    Ok(store.find_room_by_code(&code).await?.is_some())
                })
                .await?;
            let handle = spawn_room(
                RoomSeed {
                    code: code.clone(),
                    host: host.clone(),
                    settings: settings.clone(),
                    created_at,
                },
                self.ctx.clone(),
            );
            table.insert(code, handle.clone());
            handle
        };
        let code = handle.code().clone();

        if let Err(e) = self
            .persist_new_room(&code, &host, &settings, created_at)
            .await
        {
            tracing::error!(room = %code, error = %e, "failed to persist new room");
            self.ctx.table.write().await.remove(&code);
            let _ = handle.shutdown().await;
            return Err(e.into());
        }

        tracing::info!(room = %code, %host, "room created");
        handle.snapshot().await
    }

    /// Writes the room record and the host membership. If the membership
    /// fails, the room record written here is removed again; a failed room
    /// write leaves the store untouched.
    async fn persist_new_room(
        &self,
        code: &RoomCode,
        host: &UserId,
        settings: &RoomSettings,
        created_at: u64,
    ) -> Result<(), geoguess_store::StoreError> {
        self.ctx
            .store
            .create_room(&RoomRecord {
                code: code.clone(),
                host: host.clone(),
                status: RoomStatus::Waiting,
                settings: settings.clone(),
                current_round: 0,
                created_at,
            })
            .await?;
        let membership = self
            .ctx
            .store
            .create_membership(&MembershipRecord {
                code: code.clone(),
                user_id: host.clone(),
                score: 0,
                ready: true,
                joined_at: created_at,
            })
            .await;
        if membership.is_err() {
            if let Err(e) = self.ctx.store.delete_room(code).await {
                tracing::warn!(room = %code, error = %e, "could not remove half-created room");
            }
        }
        membership
    }

    /// The handle for a live room.
    pub async fn room(&self, code: &RoomCode) -> Result<RoomHandle, RoomError> {
        self.ctx
            .table
            .read()
            .await
            .get(code)
            .cloned()
            .ok_or_else(|| RoomError::NotFound(code.clone()))
    }

    pub async fn join_room(
        &self,
        code: &RoomCode,
        user: UserId,
    ) -> Result<RoomSnapshot, RoomError> {
        self.room(code).await?.join(user).await
    }

    pub async fn leave_room(
        &self,
        code: &RoomCode,
        user: UserId,
    ) -> Result<LeaveOutcome, RoomError> {
        self.room(code).await?.leave(user).await
    }

    pub async fn set_ready(
        &self,
        code: &RoomCode,
        user: UserId,
        ready: bool,
    ) -> Result<RoomSnapshot, RoomError> {
        self.room(code).await?.set_ready(user, ready).await
    }

    /// Host-only, forward-only status change. `ACTIVE` starts the game,
    /// `FINISHED` ends it early.
    pub async fn update_status(
        &self,
        code: &RoomCode,
        requester: UserId,
        status: RoomStatus,
    ) -> Result<RoomSnapshot, RoomError> {
        self.room(code).await?.update_status(requester, status).await
    }

    pub async fn advance_round(
        &self,
        code: &RoomCode,
        requester: UserId,
    ) -> Result<RoomSnapshot, RoomError> {
        self.room(code).await?.advance_round(requester).await
    }

    pub async fn close_round(
        &self,
        code: &RoomCode,
        requester: UserId,
    ) -> Result<RoomSnapshot, RoomError> {
        self.room(code).await?.close_round(requester).await
    }

    pub async fn submit_guess(
        &self,
        code: &RoomCode,
        user: UserId,
        round: u32,
        location: Coordinate,
    ) -> Result<GuessOutcome, RoomError> {
        self.room(code).await?.submit_guess(user, round, location).await
    }

    pub async fn snapshot(&self, code: &RoomCode) -> Result<RoomSnapshot, RoomError> {
        self.room(code).await?.snapshot().await
    }

    /// Number of live rooms.
    pub async fn room_count(&self) -> usize {
        self.ctx.table.read().await.len()
    }

    /// Codes of every live room.
    pub async fn codes(&self) -> Vec<RoomCode> {
        self.ctx.table.read().await.keys().cloned().collect()
    }

    /// Stops every room actor. Store records are kept.
    pub async fn shutdown(&self) {
        let handles: Vec<RoomHandle> = {
            let mut table = self.ctx.table.write().await;
            table.drain().map(|(_, handle)| handle).collect()
        };
        tracing::info!(rooms = handles.len(), "shutting down rooms");
        for handle in handles {
            let _ = handle.shutdown().await;
        }
    }
}

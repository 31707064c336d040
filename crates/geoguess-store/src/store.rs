//! The [`Store`] trait.

use std::collections::HashMap;
use std::future::Future;

use geoguess_protocol::{RoomCode, UserId};

use crate::{
    GameResult, MembershipRecord, ResultQuery, RoomRecord, StoreError,
};

/// Durable storage for rooms, memberships, and game results.
///
/// Methods return `impl Future + Send` so room actors (which run on the
/// multi-threaded Tokio runtime) can await them. Implementations may write
/// them as plain `async fn`.
pub trait Store: Send + Sync + 'static {
    fn create_room(
        &self,
        room: &RoomRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn find_room_by_code(
        &self,
        code: &RoomCode,
    ) -> impl Future<Output = Result<Option<RoomRecord>, StoreError>> + Send;

    fn update_room(
        &self,
        room: &RoomRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Deletes a room and every membership in it.
    fn delete_room(
        &self,
        code: &RoomCode,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn create_membership(
        &self,
        membership: &MembershipRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn update_membership(
        &self,
        membership: &MembershipRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn delete_membership(
        &self,
        code: &RoomCode,
        user: &UserId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Memberships of a room, in join order.
    fn list_memberships(
        &self,
        code: &RoomCode,
    ) -> impl Future<Output = Result<Vec<MembershipRecord>, StoreError>> + Send;

    fn append_game_result(
        &self,
        result: &GameResult,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn query_results(
        &self,
        query: &ResultQuery,
    ) -> impl Future<Output = Result<Vec<GameResult>, StoreError>> + Send;

    /// Best score per identified player.
    ///
    /// The default loads every identified result and groups in memory.
    /// Stores that can group in their query layer should override it.
    fn best_scores(
        &self,
    ) -> impl Future<Output = Result<HashMap<UserId, u32>, StoreError>> + Send
    {
        async move {
            let query = ResultQuery::all().identified_only();
            let rows = self.query_results(&query).await?;
            let mut best: HashMap<UserId, u32> = HashMap::new();
            for row in rows {
                if let Some(user) = row.user_id {
                    let entry = best.entry(user).or_insert(row.score);
                    *entry = (*entry).max(row.score);
                }
            }
            Ok(best)
        }
    }
}

//! In-memory [`Store`] implementation.

use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use geoguess_protocol::{RoomCode, UserId};
use tokio::sync::RwLock;

use crate::{
    GameResult, MembershipRecord, ResultOrder, ResultQuery, RoomRecord,
    Store, StoreError,
};

#[derive(Default)]
struct Tables {
    rooms: HashMap<RoomCode, RoomRecord>,
    /// Memberships per room, in join order.
    memberships: HashMap<RoomCode, Vec<MembershipRecord>>,
    results: Vec<GameResult>,
}

/// A [`Store`] that keeps everything in process memory.
///
/// All tables sit behind one `RwLock`; writes are short and never await
/// while holding it across anything but the lock itself.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    fail_result_appends: AtomicBool,
    fail_room_creates: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent [`Store::append_game_result`] fail with
    /// [`StoreError::Unavailable`] (or succeed again when `false`).
    ///
    /// Lets tests exercise the engine's best-effort durability path.
    pub fn fail_result_appends(&self, fail: bool) {
        self.fail_result_appends.store(fail, Ordering::Relaxed);
    }

    /// Makes every subsequent [`Store::create_room`] fail with
    /// [`StoreError::Unavailable`].
    pub fn fail_room_creates(&self, fail: bool) {
        self.fail_room_creates.store(fail, Ordering::Relaxed);
    }

    /// Number of rooms currently stored.
    pub async fn room_count(&self) -> usize {
        self.tables.read().await.rooms.len()
    }

    /// Number of game results appended so far.
    pub async fn result_count(&self) -> usize {
        self.tables.read().await.results.len()
    }
}

/// Orders results for [`ResultOrder::ScoreDesc`].
fn by_score_desc(a: &GameResult, b: &GameResult) -> CmpOrdering {
    b.score
        .cmp(&a.score)
        .then_with(|| match (a.distance_km, b.distance_km) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => CmpOrdering::Less,
            (None, Some(_)) => CmpOrdering::Greater,
            (None, None) => CmpOrdering::Equal,
        })
        .then_with(|| b.played_at.cmp(&a.played_at))
}

impl Store for MemoryStore {
    async fn create_room(&self, room: &RoomRecord) -> Result<(), StoreError> {
        if self.fail_room_creates.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("room writes disabled".into()));
        }
        let mut tables = self.tables.write().await;
        if tables.rooms.contains_key(&room.code) {
            return Err(StoreError::Duplicate(format!("room {}", room.code)));
        }
        tables.rooms.insert(room.code.clone(), room.clone());
        tables.memberships.insert(room.code.clone(), Vec::new());
        Ok(())
    }

    async fn find_room_by_code(
        &self,
        code: &RoomCode,
    ) -> Result<Option<RoomRecord>, StoreError> {
        Ok(self.tables.read().await.rooms.get(code).cloned())
    }

    async fn update_room(&self, room: &RoomRecord) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .rooms
            .get_mut(&room.code)
            .ok_or_else(|| StoreError::NotFound(format!("room {}", room.code)))?;
        *slot = room.clone();
        Ok(())
    }

    async fn delete_room(&self, code: &RoomCode) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.memberships.remove(code);
        tables
            .rooms
            .remove(code)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("room {code}")))
    }

    async fn create_membership(
        &self,
        membership: &MembershipRecord,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let members = tables.memberships.get_mut(&membership.code).ok_or_else(
            || StoreError::NotFound(format!("room {}", membership.code)),
        )?;
        if members.iter().any(|m| m.user_id == membership.user_id) {
            return Err(StoreError::Duplicate(format!(
                "membership {}/{}",
                membership.code, membership.user_id
            )));
        }
        members.push(membership.clone());
        Ok(())
    }

    async fn update_membership(
        &self,
        membership: &MembershipRecord,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .memberships
            .get_mut(&membership.code)
            .and_then(|members| {
                members
                    .iter_mut()
                    .find(|m| m.user_id == membership.user_id)
            })
            .ok_or_else(|| {
                StoreError::NotFound(format!(
                    "membership {}/{}",
                    membership.code, membership.user_id
                ))
            })?;
        *slot = membership.clone();
        Ok(())
    }

    async fn delete_membership(
        &self,
        code: &RoomCode,
        user: &UserId,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let members = tables
            .memberships
            .get_mut(code)
            .ok_or_else(|| StoreError::NotFound(format!("room {code}")))?;
        let before = members.len();
        members.retain(|m| &m.user_id != user);
        if members.len() == before {
            return Err(StoreError::NotFound(format!(
                "membership {code}/{user}"
            )));
        }
        Ok(())
    }

    async fn list_memberships(
        &self,
        code: &RoomCode,
    ) -> Result<Vec<MembershipRecord>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .memberships
            .get(code)
            .cloned()
            .unwrap_or_default())
    }

    async fn append_game_result(
        &self,
        result: &GameResult,
    ) -> Result<(), StoreError> {
        if self.fail_result_appends.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable(
                "result log rejected the write".into(),
            ));
        }
        self.tables.write().await.results.push(result.clone());
        Ok(())
    }

    async fn query_results(
        &self,
        query: &ResultQuery,
    ) -> Result<Vec<GameResult>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<GameResult> = tables
            .results
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        drop(tables);

        match query.order {
            ResultOrder::Appended => {}
            ResultOrder::Newest => {
                rows.sort_by(|a, b| b.played_at.cmp(&a.played_at))
            }
            ResultOrder::ScoreDesc => rows.sort_by(by_score_desc),
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }
}

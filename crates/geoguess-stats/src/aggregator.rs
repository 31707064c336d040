//! Leaderboard, recent winners, and personal stats.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use geoguess_protocol::{
    GameMode, LeaderboardEntry, PersonalStats, RecentWinner, UserId,
    now_millis,
};
use geoguess_store::{GameResult, ResultOrder, ResultQuery, Store};

use crate::StatsError;

/// Rows returned when the caller doesn't ask for a number.
pub const DEFAULT_LIMIT: usize = 10;

/// Largest page any query returns.
pub const MAX_LIMIT: usize = 100;

/// Trailing window for [`StatsAggregator::recent_winners`] when the caller
/// doesn't pick one.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Computes statistics from the result log.
pub struct StatsAggregator<S> {
    store: Arc<S>,
}

impl<S> Clone for StatsAggregator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

/// Running totals for one player.
#[derive(Debug, Default)]
struct Tally {
    games: u64,
    best_score: u32,
    score_sum: u64,
    best_distance_km: Option<f64>,
    last_played: u64,
}

impl Tally {
    fn add(&mut self, result: &GameResult) {
        self.games += 1;
        self.best_score = self.best_score.max(result.score);
        self.score_sum += u64::from(result.score);
        if let Some(d) = result.distance_km {
            self.best_distance_km =
                Some(self.best_distance_km.map_or(d, |best| best.min(d)));
        }
        self.last_played = self.last_played.max(result.played_at);
    }

    fn average(&self) -> f64 {
        if self.games == 0 {
            0.0
        } else {
            self.score_sum as f64 / self.games as f64
        }
    }
}

impl<S: Store> StatsAggregator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Top players by best single score.
    ///
    /// Ties on best score go to the higher average, then to the lower user
    /// id so the order is stable. Anonymous results don't count.
    pub async fn leaderboard(
        &self,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>, StatsError> {
        let limit = clamp_limit(limit);
        let rows = self
            .store
            .query_results(&ResultQuery::all().identified_only())
            .await?;

        let mut tallies: HashMap<UserId, Tally> = HashMap::new();
        for row in &rows {
            if let Some(user) = &row.user_id {
                tallies.entry(user.clone()).or_default().add(row);
            }
        }

        let mut ranked: Vec<(UserId, Tally)> = tallies.into_iter().collect();
        ranked.sort_by(|(ua, a), (ub, b)| {
            b.best_score
                .cmp(&a.best_score)
                .then_with(|| {
                    b.average().partial_cmp(&a.average()).unwrap_or(Ordering::Equal)
                })
                .then_with(|| ua.cmp(ub))
        });

        let entries: Vec<LeaderboardEntry> = ranked
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(i, (user_id, tally))| LeaderboardEntry {
                rank: i as u32 + 1,
                average_score: tally.average(),
                user_id,
                best_score: tally.best_score,
                total_games: tally.games,
                best_distance_km: tally.best_distance_km,
                last_played: tally.last_played,
            })
            .collect();
        tracing::debug!(rows = rows.len(), entries = entries.len(), "leaderboard computed");
        Ok(entries)
    }

    /// Best results inside the trailing `window`, solo and multiplayer,
    /// anonymous included.
    pub async fn recent_winners(
        &self,
        window: Duration,
        limit: usize,
    ) -> Result<Vec<RecentWinner>, StatsError> {
        self.recent_winners_at(now_millis(), window, limit).await
    }

    /// [`recent_winners`](Self::recent_winners) with an explicit "now" in
    /// Unix milliseconds.
    pub async fn recent_winners_at(
        &self,
        now_ms: u64,
        window: Duration,
        limit: usize,
    ) -> Result<Vec<RecentWinner>, StatsError> {
        let window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
        let query = ResultQuery::all()
            .since(now_ms.saturating_sub(window_ms))
            .order(ResultOrder::ScoreDesc)
            .limit(clamp_limit(limit));
        let rows = self.store.query_results(&query).await?;
        Ok(rows
            .into_iter()
            .map(|row| RecentWinner {
                user_id: row.user_id,
                mode: row.mode,
                score: row.score,
                distance_km: row.distance_km,
                played_at: row.played_at,
            })
            .collect())
    }

    /// Everything we know about one player.
    ///
    /// `global_rank` is one more than the number of players whose best
    /// score beats this player's. A player with no results is ranked after
    /// everyone who has one.
    pub async fn personal_stats(
        &self,
        user: &UserId,
    ) -> Result<PersonalStats, StatsError> {
        let rows = self
            .store
            .query_results(&ResultQuery::for_user(user.clone()))
            .await?;
        let best_scores = self.store.best_scores().await?;

        if rows.is_empty() {
            let rank = best_scores.len() as u32 + 1;
            return Ok(PersonalStats::empty(user.clone(), rank));
        }

        let mut tally = Tally::default();
        let mut solo_games = 0;
        let mut distance_sum = 0.0;
        let mut distance_count = 0u64;
        let mut first_played = u64::MAX;
        for row in &rows {
            tally.add(row);
            if row.mode == GameMode::Solo {
                solo_games += 1;
            }
            if let Some(d) = row.distance_km {
                distance_sum += d;
                distance_count += 1;
            }
            first_played = first_played.min(row.played_at);
        }

        let better = best_scores
            .iter()
            .filter(|(other, best)| *other != user && **best > tally.best_score)
            .count();

        Ok(PersonalStats {
            user_id: user.clone(),
            total_games: tally.games,
            solo_games,
            multiplayer_games: tally.games - solo_games,
            best_score: tally.best_score,
            average_score: tally.average(),
            best_distance_km: tally.best_distance_km,
            average_distance_km: (distance_count > 0)
                .then(|| distance_sum / distance_count as f64),
            total_distance_km: distance_sum,
            first_played: Some(first_played),
            last_played: Some(tally.last_played),
            global_rank: better as u32 + 1,
        })
    }
}

fn clamp_limit(limit: usize) -> usize {
    match limit {
        0 => DEFAULT_LIMIT,
        n => n.min(MAX_LIMIT),
    }
}

//! One round's guesses and the seal that turns them into results.
//!
//! Pure state, no I/O: the room actor owns a [`Round`] and decides when to
//! call [`Round::seal`]. Everything here runs inside the actor's serialized
//! loop, so "compare status, then commit" is atomic with respect to every
//! other command for the same room.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Duration;

use geoguess_geo::Coordinate;
use geoguess_protocol::{
    GuessOutcome, RoundStatus, RoundView, Standing, UserId,
};

use crate::{RoomError, RoundTarget};

/// A guess as recorded at acceptance time.
#[derive(Debug, Clone, PartialEq)]
struct Guess {
    location: Coordinate,
    distance_km: f64,
    score: u32,
    submitted_at: u64,
}

#[derive(Debug)]
pub(crate) struct Round {
    pub index: u32,
    pub target: RoundTarget,
    pub status: RoundStatus,
    pub time_limit: Option<Duration>,
    pub started_at: u64,
    pub ended_at: Option<u64>,
    guesses: HashMap<UserId, Guess>,
    outcomes: Vec<GuessOutcome>,
}

impl Round {
    /// A freshly opened round, accepting guesses.
    pub fn open(
        index: u32,
        target: RoundTarget,
        time_limit: Option<Duration>,
        started_at: u64,
    ) -> Self {
        Self {
            index,
            target,
            status: RoundStatus::Active,
            time_limit,
            started_at,
            ended_at: None,
            guesses: HashMap::new(),
            outcomes: Vec::new(),
        }
    }

    /// `ACTIVE → GUESSING`. Returns `false` if the round had already moved
    /// on.
    pub fn open_guessing(&mut self) -> bool {
        if self.status != RoundStatus::Active {
            return false;
        }
        self.status = RoundStatus::Guessing;
        true
    }

    /// Records a guess. The first accepted guess per player is final.
    pub fn submit(
        &mut self,
        user: &UserId,
        location: Coordinate,
        now: u64,
    ) -> Result<GuessOutcome, RoomError> {
        if !self.status.accepts_guesses() {
            return Err(RoomError::InvalidState(format!(
                "round {} is {}",
                self.index, self.status
            )));
        }
        if self.guesses.contains_key(user) {
            return Err(RoomError::AlreadyGuessed {
                user: user.clone(),
                round: self.index,
            });
        }
        let location = location.validated()?;

        let distance_km = self.target.location.distance_km(&location);
        let guess = Guess {
            location,
            distance_km,
            score: geoguess_geo::score(distance_km),
            submitted_at: now,
        };
        let outcome = self.outcome_for(user, Some(&guess));
        self.guesses.insert(user.clone(), guess);
        Ok(outcome)
    }

    pub fn has_guessed(&self, user: &UserId) -> bool {
        self.guesses.contains_key(user)
    }

    /// `true` when there is at least one member and every one of them has
    /// guessed.
    pub fn all_guessed<'a>(
        &self,
        members: impl IntoIterator<Item = &'a UserId>,
    ) -> bool {
        let mut any = false;
        for member in members {
            any = true;
            if !self.guesses.contains_key(member) {
                return false;
            }
        }
        any
    }

    /// Closes the round and returns the ranked outcomes, one per member.
    ///
    /// Members without a guess get a miss. Guesses from players who have
    /// since left are dropped. Returns `None` if the round was already
    /// sealed, which makes a second seal attempt a no-op.
    pub fn seal(
        &mut self,
        members: &[UserId],
        now: u64,
    ) -> Option<Vec<GuessOutcome>> {
        if !self.status.accepts_guesses() {
            return None;
        }
        self.status = RoundStatus::Results;
        self.ended_at = Some(now);

        let mut outcomes: Vec<GuessOutcome> = members
            .iter()
            .map(|member| self.outcome_for(member, self.guesses.get(member)))
            .collect();
        rank_outcomes(&mut outcomes);
        self.outcomes = outcomes.clone();
        Some(outcomes)
    }

    /// `RESULTS → FINISHED`.
    pub fn finish(&mut self) {
        if self.status == RoundStatus::Results {
            self.status = RoundStatus::Finished;
        }
    }

    /// Ranked outcomes, empty until sealed.
    pub fn outcomes(&self) -> &[GuessOutcome] {
        &self.outcomes
    }

    /// The client view of this round. `members` gives the order of
    /// `guessed`. The target stays hidden while guesses are open.
    pub fn view(
        &self,
        members: &[UserId],
        time_left: Option<Duration>,
    ) -> RoundView {
        let sealed = self.status.is_sealed();
        RoundView {
            index: self.index,
            image_id: self.target.image_id.clone(),
            status: self.status,
            started_at: self.started_at,
            time_limit_secs: self.time_limit.map(|d| d.as_secs()),
            deadline_at: self
                .time_limit
                .map(|d| self.started_at + d.as_millis() as u64),
            time_left_ms: time_left
                .filter(|_| !sealed)
                .map(|d| d.as_millis() as u64),
            ended_at: self.ended_at,
            guessed: members
                .iter()
                .filter(|m| self.has_guessed(m))
                .cloned()
                .collect(),
            target: sealed.then_some(self.target.location),
            outcomes: self.outcomes().to_vec(),
        }
    }

    fn outcome_for(&self, user: &UserId, guess: Option<&Guess>) -> GuessOutcome {
        match guess {
            Some(g) => GuessOutcome {
                user_id: user.clone(),
                round: self.index,
                location: Some(g.location),
                distance_km: Some(g.distance_km),
                score: g.score,
                submitted_at: Some(g.submitted_at),
            },
            None => GuessOutcome {
                user_id: user.clone(),
                round: self.index,
                location: None,
                distance_km: None,
                score: 0,
                submitted_at: None,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

/// Score desc, then distance asc with misses last, then submission time
/// asc, then user id.
pub(crate) fn rank_outcomes(outcomes: &mut [GuessOutcome]) {
    outcomes.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| cmp_missing_last(a.distance_km, b.distance_km))
            .then_with(|| match (a.submitted_at, b.submitted_at) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
}

fn cmp_missing_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Builds standings from `(user, total)` pairs given in join order.
/// Ties keep join order.
pub(crate) fn standings<'a>(
    totals: impl IntoIterator<Item = (&'a UserId, u64)>,
) -> Vec<Standing> {
    let mut rows: Vec<(&UserId, u64)> = totals.into_iter().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1));
    rows.into_iter()
        .enumerate()
        .map(|(i, (user, total))| Standing {
            rank: i as u32 + 1,
            user_id: user.clone(),
            total_score: total,
        })
        .collect()
}

//! Random room code allocation.

use std::future::Future;

use geoguess_protocol::{ROOM_CODE_ALPHABET, ROOM_CODE_LEN, RoomCode};
use rand::Rng;

use crate::RoomError;

/// Default number of draws before giving up.
pub const DEFAULT_CODE_ATTEMPTS: u32 = 10;

/// Draws six-character codes from [`ROOM_CODE_ALPHABET`] until one is
/// unused.
///
/// With 34^6 (about 1.5 billion) codes a collision is rare until the
/// number of live rooms gets very large, so a small attempt budget is
/// plenty. Exhausting it is reported rather than retried forever.
#[derive(Debug, Clone)]
pub struct RoomCodeGenerator {
    max_attempts: u32,
}

impl RoomCodeGenerator {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Returns a code for which `exists` is false, using the thread-local
    /// RNG.
    pub fn generate(
        &self,
        exists: impl Fn(&RoomCode) -> bool,
    ) -> Result<RoomCode, RoomError> {
        self.generate_with(&mut rand::rng(), exists)
    }

    /// Like [`generate`](Self::generate) with a caller-supplied RNG.
    pub fn generate_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        exists: impl Fn(&RoomCode) -> bool,
    ) -> Result<RoomCode, RoomError> {
        for attempt in 1..=self.max_attempts {
            let code = random_code(rng)?;
            if !exists(&code) {
                return Ok(code);
            }
            tracing::debug!(%code, attempt, "room code collision");
        }
        Err(self.exhausted())
    }

    /// Like [`generate`](Self::generate), for existence checks that have to
    /// await (a store lookup). An error from `taken` ends the search.
    pub async fn generate_async<F, Fut>(
        &self,
        mut taken: F,
    ) -> Result<RoomCode, RoomError>
    where
        F: FnMut(RoomCode) -> Fut,
        Fut: Future<Output = Result<bool, RoomError>>,
    {
        for attempt in 1..=self.max_attempts {
            let code = random_code(&mut rand::rng())?;
            if !taken(code.clone()).await? {
                return Ok(code);
            }
            tracing::debug!(%code, attempt, "room code collision");
        }
        Err(self.exhausted())
    }

    fn exhausted(&self) -> RoomError {
        tracing::error!(
            attempts = self.max_attempts,
            "room code space exhausted"
        );
        RoomError::CodeSpaceExhausted(self.max_attempts)
    }
}

impl Default for RoomCodeGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_CODE_ATTEMPTS)
    }
}

fn random_code<R: Rng + ?Sized>(rng: &mut R) -> Result<RoomCode, RoomError> {
    let alphabet = ROOM_CODE_ALPHABET.as_bytes();
    let raw: String = (0..ROOM_CODE_LEN)
        .map(|_| alphabet[rng.random_range(0..alphabet.len())] as char)
        .collect();
    // Every character comes from the alphabet, so parsing only fails if
    // the constants disagree.
    RoomCode::parse(&raw).map_err(|e| RoomError::InvalidState(e.to_string()))
}

//! Persistence contract for Geoguess.
//!
//! The engine never talks to a database directly. It talks to a [`Store`]:
//! a handful of async methods keyed by room code and user id. What sits
//! behind them (SQL, a document store, a file) is somebody else's problem.
//!
//! [`MemoryStore`] is the in-process implementation used by the server
//! binary and by every test in the workspace.
//!
//! # Records
//!
//! - [`RoomRecord`] / [`MembershipRecord`]: durable mirror of live rooms.
//!   Written best-effort by the room actors.
//! - [`GameResult`]: one player's outcome for one round (or one solo
//!   guess). Append-only; the sole input to leaderboards.

mod error;
mod memory;
mod records;
mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use records::{
    GameResult, MembershipRecord, ResultOrder, ResultQuery, RoomRecord,
};
pub use store::Store;

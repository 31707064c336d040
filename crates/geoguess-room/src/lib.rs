//! Rooms and rounds for Geoguess.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns its
//! members, its current round, and the round's deadline.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: creates rooms and routes requests to them by code
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`RoomCodeGenerator`]: draws unused six-character codes
//! - [`TargetSource`]: picks each round's image and answer
//! - [`EngineConfig`]: server-wide engine settings

mod code;
mod config;
mod error;
mod registry;
mod room;
mod round;
mod target;

pub use code::{DEFAULT_CODE_ATTEMPTS, RoomCodeGenerator};
pub use config::EngineConfig;
pub use error::RoomError;
pub use registry::RoomRegistry;
pub use room::{LeaveOutcome, RoomHandle};
pub use target::{RoundTarget, TargetList, TargetSource};

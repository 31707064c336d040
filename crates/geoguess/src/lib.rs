//! # Geoguess
//!
//! Multiplayer server for a geography-guessing game.
//!
//! Players join rooms by a short code, then race through a shared sequence
//! of rounds: every round shows an image taken somewhere on Earth, and
//! each player drops a pin where they think it is. The closer the pin, the
//! higher the score.
//!
//! This crate wires the layers together:
//!
//! ```text
//! WebSocket ─→ handler ─→ Orchestrator ─→ RoomRegistry ─→ room actor
//!     ▲                                                      │
//!     └──────────── ConnectionHub (Outbox) ◀─────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use geoguess::prelude::*;
//!
//! # async fn run() -> Result<(), GeoguessError> {
//! let server = GeoguessServerBuilder::new()
//!     .bind("0.0.0.0:8080")
//!     .build(DevAuthenticator, Arc::new(MemoryStore::new()))
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod hub;
mod orchestrator;
mod server;

pub use config::ServerConfig;
pub use error::GeoguessError;
pub use hub::{ConnectionHub, Registration};
pub use orchestrator::{error_event, Orchestrator};
pub use server::{GeoguessServer, GeoguessServerBuilder};

/// Everything needed to embed or test a server.
pub mod prelude {
    pub use crate::{
        ConnectionHub, GeoguessError, GeoguessServer, GeoguessServerBuilder,
        Orchestrator, ServerConfig,
    };
    pub use geoguess_geo::Coordinate;
    pub use geoguess_protocol::{
        ClientEvent, Codec, Envelope, ErrorKind, JsonCodec, Outbox, RoomCode,
        RoomSettings, RoomSnapshot, RoomStatus, RoundStatus, RoundView,
        ServerEvent, UserId, PROTOCOL_VERSION,
    };
    pub use geoguess_room::{EngineConfig, RoundTarget, TargetList, TargetSource};
    pub use geoguess_session::{
        Authenticator, DevAuthenticator, SessionConfig, SessionError,
    };
    pub use geoguess_store::{MemoryStore, Store};
}

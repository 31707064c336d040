//! Player sessions for Geoguess.
//!
//! This crate handles the lifecycle of player connections:
//!
//! 1. **Authentication**: turning a client token into a [`UserId`]
//!    ([`Authenticator`] trait). Identity itself is external and trusted.
//! 2. **Session tracking**: knowing who's connected ([`SessionManager`])
//! 3. **Reconnection**: letting players resume after a dropped socket
//!    (token-based, with a configurable grace period)
//!
//! A disconnect is not a room leave. A player who drops mid-round keeps
//! their membership; if they don't come back before the round seals, the
//! round engine records a miss for them.
//!
//! [`UserId`]: geoguess_protocol::UserId

#![allow(async_fn_in_trait)]

mod auth;
mod error;
mod manager;
mod session;

pub use auth::{Authenticator, DevAuthenticator};
pub use error::SessionError;
pub use manager::SessionManager;
pub use session::{Session, SessionConfig, SessionState};

//! Session types: the server's record of a connected player.

use std::time::{Duration, Instant};

use geoguess_protocol::UserId;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session behavior.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long (in seconds) a disconnected player has to reconnect
    /// before their session is expired.
    ///
    /// Default: 30 seconds. Set to 0 to disable reconnection entirely.
    pub reconnect_grace_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_grace_secs: 30,
        }
    }
}

impl SessionConfig {
    pub fn reconnect_grace(&self) -> Duration {
        Duration::from_secs(self.reconnect_grace_secs)
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// The current state of a player's session.
///
/// ```text
///   Connected ──(disconnect)──→ Disconnected ──(timeout)──→ Expired
///       ↑                            │
///       └────────(reconnect)─────────┘
/// ```
#[derive(Debug, Clone)]
pub enum SessionState {
    Connected,

    /// They have until `since + grace` to reconnect.
    Disconnected { since: Instant },

    /// Waiting for [`SessionManager::cleanup_expired`](crate::SessionManager::cleanup_expired).
    Expired,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A single player's session on the server.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: UserId,

    pub state: SessionState,

    /// Secret handed to the client in `Welcome`. Presenting it in a later
    /// `Hello` resumes the session without re-authenticating.
    ///
    /// 32 hex characters (128 bits of randomness).
    pub reconnect_token: String,
}

impl Session {
    pub fn is_connected(&self) -> bool {
        matches!(self.state, SessionState::Connected)
    }
}

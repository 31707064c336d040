//! The session manager: tracks every connected (or recently dropped)
//! player.
//!
//! `SessionManager` is plain data with `&mut self` methods. The server
//! keeps it behind a mutex and never holds that lock across an await.

use std::collections::HashMap;
use std::time::Instant;

use geoguess_protocol::UserId;
use rand::Rng;

use crate::{Session, SessionConfig, SessionError, SessionState};

/// Manages all player sessions.
///
/// ```text
/// authenticate() ──→ create() ──→ disconnect() ──→ reconnect()
///                       │               │                │
///                       ▼               ▼                ▼
///                  [Connected]   [Disconnected]    [Connected]
///                                      │
///                                      ▼ expire_stale() after grace
///                                  [Expired] ──→ cleanup_expired()
/// ```
pub struct SessionManager {
    sessions: HashMap<UserId, Session>,
    /// Reconnect token → owner. Kept in sync with `sessions`.
    tokens: HashMap<String, UserId>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            tokens: HashMap::new(),
            config,
        }
    }

    /// Creates a session after successful authentication and issues a
    /// fresh reconnect token.
    ///
    /// A disconnected or expired session for the same user is replaced.
    ///
    /// # Errors
    /// [`SessionError::AlreadyConnected`] if the user is connected
    /// elsewhere.
    pub fn create(&mut self, user_id: UserId) -> Result<Session, SessionError> {
        if let Some(existing) = self.sessions.get(&user_id) {
            if existing.is_connected() {
                return Err(SessionError::AlreadyConnected(user_id));
            }
            self.tokens.remove(&existing.reconnect_token);
        }

        let session = Session {
            user_id: user_id.clone(),
            state: SessionState::Connected,
            reconnect_token: generate_token(),
        };
        self.tokens
            .insert(session.reconnect_token.clone(), user_id.clone());
        self.sessions.insert(user_id.clone(), session.clone());

        tracing::info!(user = %user_id, "session created");
        Ok(session)
    }

    /// Marks a user as disconnected and starts the grace period.
    pub fn disconnect(&mut self, user_id: &UserId) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(user_id)
            .ok_or_else(|| SessionError::NotFound(user_id.clone()))?;

        session.state = SessionState::Disconnected {
            since: Instant::now(),
        };
        tracing::info!(user = %user_id, "user disconnected, grace period started");
        Ok(())
    }

    /// Resumes a disconnected session using its reconnect token.
    ///
    /// # Errors
    /// - [`SessionError::InvalidToken`]: token not recognized
    /// - [`SessionError::SessionExpired`]: grace period elapsed
    /// - [`SessionError::AlreadyConnected`]: the session never dropped
    pub fn reconnect(&mut self, token: &str) -> Result<Session, SessionError> {
        let user_id = self
            .tokens
            .get(token)
            .cloned()
            .ok_or(SessionError::InvalidToken)?;
        let grace = self.config.reconnect_grace();
        let session = self
            .sessions
            .get_mut(&user_id)
            .ok_or(SessionError::InvalidToken)?;

        match &session.state {
            SessionState::Disconnected { since } => {
                if since.elapsed() >= grace {
                    session.state = SessionState::Expired;
                    return Err(SessionError::SessionExpired(user_id));
                }
                session.state = SessionState::Connected;
                tracing::info!(user = %user_id, "user reconnected");
                Ok(session.clone())
            }
            SessionState::Connected => Err(SessionError::AlreadyConnected(user_id)),
            SessionState::Expired => Err(SessionError::SessionExpired(user_id)),
        }
    }

    /// Expires every disconnected session past its grace period and
    /// returns their owners.
    pub fn expire_stale(&mut self) -> Vec<UserId> {
        let grace = self.config.reconnect_grace();
        let mut expired = Vec::new();

        for session in self.sessions.values_mut() {
            if let SessionState::Disconnected { since } = &session.state {
                if since.elapsed() >= grace {
                    session.state = SessionState::Expired;
                    expired.push(session.user_id.clone());
                    tracing::info!(
                        user = %session.user_id,
                        "session expired (grace period elapsed)"
                    );
                }
            }
        }

        expired
    }

    /// Drops expired sessions. Separate from [`expire_stale`](Self::expire_stale)
    /// so callers can react to expirations first.
    pub fn cleanup_expired(&mut self) {
        let tokens = &mut self.tokens;
        self.sessions.retain(|_, session| {
            if matches!(session.state, SessionState::Expired) {
                tokens.remove(&session.reconnect_token);
                false
            } else {
                true
            }
        });
    }

    pub fn get(&self, user_id: &UserId) -> Option<&Session> {
        self.sessions.get(user_id)
    }

    /// Number of sessions in any state.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Number of sessions currently connected.
    pub fn connected_count(&self) -> usize {
        self.sessions.values().filter(|s| s.is_connected()).count()
    }
}

/// A random 32-character hex string (128 bits of entropy).
fn generate_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// =========================================================================
// Tests
// =========================================================================

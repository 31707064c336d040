//! Authentication hook for validating player identity.
//!
//! Geoguess doesn't authenticate anyone itself. The identity provider
//! (an OAuth proxy, a signed session cookie, a JWT) sits in front of the
//! server; the [`Authenticator`] trait is where its verdict is turned into
//! a [`UserId`] during the handshake.

use geoguess_protocol::UserId;

use crate::SessionError;

/// Validates a client's auth token and returns their identity.
///
/// # Example
///
/// ```rust
/// use geoguess_protocol::UserId;
/// use geoguess_session::{Authenticator, SessionError};
///
/// /// Accepts exactly one shared secret.
/// struct SharedSecret(String);
///
/// impl Authenticator for SharedSecret {
///     async fn authenticate(
///         &self,
///         token: &str,
///     ) -> Result<UserId, SessionError> {
///         let (user, secret) = token.split_once(':').ok_or_else(|| {
///             SessionError::AuthFailed("expected user:secret".into())
///         })?;
///         if secret != self.0 {
///             return Err(SessionError::AuthFailed("bad secret".into()));
///         }
///         Ok(UserId::new(user))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Validates the given token and returns the user's identity.
    ///
    /// Called during the handshake when a client sends
    /// [`ClientEvent::Hello`](geoguess_protocol::ClientEvent::Hello) with a
    /// token.
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<UserId, SessionError>> + Send;
}

/// Trusts the token as the user id. For local play and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct DevAuthenticator;

/// Longest token [`DevAuthenticator`] accepts.
const MAX_DEV_ID_LEN: usize = 64;

impl Authenticator for DevAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<UserId, SessionError> {
        let id = token.trim();
        if id.is_empty() {
            return Err(SessionError::AuthFailed("empty token".into()));
        }
        if id.len() > MAX_DEV_ID_LEN {
            return Err(SessionError::AuthFailed(format!(
                "token longer than {MAX_DEV_ID_LEN} bytes"
            )));
        }
        Ok(UserId::new(id))
    }
}

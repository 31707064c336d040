//! Per-connection handler: handshake, auth, and event routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive `Hello` → validate version
//!   2. Authenticate the token, or resume with a reconnect token
//!   3. Send `Welcome` → player is connected
//!   4. Loop: decode client envelopes and hand them to the orchestrator,
//!      while draining the player's outbound queue onto the socket

use std::sync::Arc;
use std::time::Instant;

use geoguess_protocol::{
    now_millis, ClientEvent, Codec, Envelope, Outbox, ProtocolError,
    ServerEvent, UserId, PROTOCOL_VERSION,
};
use geoguess_session::{Authenticator, Session};
use geoguess_store::Store;
use geoguess_transport::{Connection, WebSocketConnection};

use crate::hub::Registration;
use crate::orchestrator::error_event;
use crate::server::ServerState;
use crate::GeoguessError;

/// Writes server envelopes with a per-connection sequence number.
struct Outbound {
    seq: u64,
    start: Instant,
}

impl Outbound {
    fn new() -> Self {
        Self {
            seq: 0,
            start: Instant::now(),
        }
    }

    async fn send(
        &mut self,
        conn: &WebSocketConnection,
        codec: &impl Codec,
        event: ServerEvent,
    ) -> Result<(), GeoguessError> {
        let envelope = Envelope::new(
            self.seq,
            self.start.elapsed().as_millis() as u64,
            event,
        );
        self.seq += 1;
        let bytes = codec.encode(&envelope)?;
        conn.send(&bytes).await?;
        Ok(())
    }
}

/// Releases a player's outbound route and session when the handler exits.
///
/// The normal path calls [`release`](Self::release). `Drop` covers early
/// returns and panics; since it is synchronous it spawns the session
/// update.
struct SessionGuard<A: Authenticator, S: Store, C: Codec> {
    user: UserId,
    registration: Registration,
    state: Arc<ServerState<A, S, C>>,
    released: bool,
}

impl<A: Authenticator, S: Store, C: Codec> SessionGuard<A, S, C> {
    async fn release(mut self) {
        self.released = true;
        self.state.hub.unregister(&self.user, self.registration);
        let mut sessions = self.state.sessions.lock().await;
        if let Err(e) = sessions.disconnect(&self.user) {
            tracing::debug!(user = %self.user, error = %e, "session already gone");
        }
    }
}

impl<A: Authenticator, S: Store, C: Codec> Drop for SessionGuard<A, S, C> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.state.hub.unregister(&self.user, self.registration);
        let user = self.user.clone();
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let _ = state.sessions.lock().await.disconnect(&user);
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A, S, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<A, S, C>>,
) -> Result<(), GeoguessError>
where
    A: Authenticator,
    S: Store,
    C: Codec,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");
    let mut out = Outbound::new();

    // --- Step 1: Handshake ---
    let session = perform_handshake(&conn, &state, &mut out).await?;
    let user = session.user_id.clone();
    tracing::info!(%conn_id, %user, "player connected");

    let (registration, mut events) = state.hub.register(user.clone());
    let guard = SessionGuard {
        user: user.clone(),
        registration,
        state: Arc::clone(&state),
        released: false,
    };
    out.send(
        &conn,
        &state.codec,
        ServerEvent::Welcome {
            user_id: user.clone(),
            reconnect_token: session.reconnect_token,
            server_time: now_millis(),
        },
    )
    .await?;

    // --- Step 2: Event loop ---
    let idle = state.config.idle_timeout;
    let mut idle_deadline = tokio::time::Instant::now() + idle;
    let result = loop {
        tokio::select! {
            incoming = tokio::time::timeout_at(idle_deadline, conn.recv()) => {
                let data = match incoming {
                    Ok(Ok(Some(data))) => {
                        idle_deadline = tokio::time::Instant::now() + idle;
                        data
                    }
                    Ok(Ok(None)) => {
                        tracing::info!(%user, "connection closed cleanly");
                        break Ok(());
                    }
                    Ok(Err(e)) => {
                        tracing::debug!(%user, error = %e, "recv error");
                        break Err(e.into());
                    }
                    Err(_) => {
                        tracing::info!(%user, "connection timed out");
                        break Ok(());
                    }
                };

                match state.codec.decode::<Envelope<ClientEvent>>(&data) {
                    Ok(envelope) => match envelope.body {
                        ClientEvent::Disconnect { reason } => {
                            tracing::info!(%user, %reason, "client disconnected");
                            break Ok(());
                        }
                        event => state.orchestrator.handle_event(&user, event).await,
                    },
                    Err(e) => {
                        tracing::debug!(%user, error = %e, "failed to decode envelope");
                        // Through the hub so it queues behind pending room events.
                        let err = GeoguessError::from(e);
                        state.hub.send_to_player(&user, error_event(&err));
                    }
                }
            }
            event = events.recv() => match event {
                Some(event) => {
                    if let Err(e) = out.send(&conn, &state.codec, event).await {
                        break Err(e);
                    }
                }
                None => {
                    tracing::debug!(%user, "outbound route replaced");
                    break Ok(());
                }
            },
        }
    };

    guard.release().await;
    let _ = conn.close().await;
    result
}

/// Performs the initial handshake: receive `Hello`, validate, then
/// authenticate or resume.
async fn perform_handshake<A, S, C>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<A, S, C>>,
    out: &mut Outbound,
) -> Result<Session, GeoguessError>
where
    A: Authenticator,
    S: Store,
    C: Codec,
{
    let data = match tokio::time::timeout(
        state.config.handshake_timeout,
        conn.recv(),
    )
    .await
    {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage(
                "connection closed before handshake".into(),
            )
            .into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage(
                "handshake timed out".into(),
            )
            .into());
        }
    };

    let envelope: Envelope<ClientEvent> = match state.codec.decode(&data) {
        Ok(envelope) => envelope,
        Err(e) => return Err(reject(conn, state, out, e.into()).await),
    };

    let ClientEvent::Hello {
        version,
        token,
        resume,
    } = envelope.body
    else {
        let err = ProtocolError::InvalidMessage(
            "first message must be Hello".into(),
        );
        return Err(reject(conn, state, out, err.into()).await);
    };

    if version != PROTOCOL_VERSION {
        let err = ProtocolError::InvalidMessage(format!(
            "protocol version mismatch: expected {PROTOCOL_VERSION}, got {version}"
        ));
        return Err(reject(conn, state, out, err.into()).await);
    }

    let session = match resume {
        Some(resume) => {
            let mut sessions = state.sessions.lock().await;
            sessions.reconnect(&resume)
        }
        None => {
            let token = token.as_deref().unwrap_or("");
            match state.auth.authenticate(token).await {
                Ok(user) => {
                    let mut sessions = state.sessions.lock().await;
                    sessions.create(user)
                }
                Err(e) => Err(e),
            }
        }
    };

    match session {
        Ok(session) => Ok(session),
        Err(e) => Err(reject(conn, state, out, e.into()).await),
    }
}

/// Tells the client why the handshake failed and hands the error back.
async fn reject<A, S, C>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<A, S, C>>,
    out: &mut Outbound,
    err: GeoguessError,
) -> GeoguessError
where
    A: Authenticator,
    S: Store,
    C: Codec,
{
    if let Err(e) = out.send(conn, &state.codec, error_event(&err)).await {
        tracing::debug!(error = %e, "could not deliver handshake error");
    }
    err
}

//! `GeoguessServer` builder and server loop.
//!
//! This is the entry point for running a Geoguess server. It ties together
//! all the layers: transport → protocol → session → orchestrator → rooms.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use geoguess_protocol::{Codec, JsonCodec, Outbox};
use geoguess_room::{EngineConfig, TargetList, TargetSource};
use geoguess_session::{Authenticator, SessionConfig, SessionManager};
use geoguess_store::Store;
use geoguess_transport::{Transport, TransportError, WebSocketTransport};
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;

use crate::handler::handle_connection;
use crate::{ConnectionHub, GeoguessError, Orchestrator, ServerConfig};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<A: Authenticator, S: Store, C: Codec> {
    pub(crate) sessions: Mutex<SessionManager>,
    pub(crate) hub: Arc<ConnectionHub>,
    pub(crate) orchestrator: Orchestrator<S>,
    pub(crate) auth: A,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
}

/// Builder for configuring and starting a Geoguess server.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use geoguess::prelude::*;
///
/// # async fn run() -> Result<(), GeoguessError> {
/// let server = GeoguessServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .build(DevAuthenticator, Arc::new(MemoryStore::new()))
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct GeoguessServerBuilder {
    config: ServerConfig,
    targets: Option<Arc<dyn TargetSource>>,
}

impl GeoguessServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            targets: None,
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.config.session = config;
        self
    }

    pub fn engine_config(mut self, config: EngineConfig) -> Self {
        self.config.engine = config;
        self
    }

    /// Where round images come from. Defaults to
    /// [`TargetList::landmarks`].
    pub fn targets(mut self, targets: Arc<dyn TargetSource>) -> Self {
        self.targets = Some(targets);
        self
    }

    /// Binds the listener and wires the layers together.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<A: Authenticator, S: Store>(
        self,
        auth: A,
        store: Arc<S>,
    ) -> Result<GeoguessServer<A, S, JsonCodec>, GeoguessError> {
        let config = self.config.validated();
        let transport = WebSocketTransport::bind(&config.bind_addr).await?;
        let targets = self
            .targets
            .unwrap_or_else(|| Arc::new(TargetList::landmarks()));

        let hub = Arc::new(ConnectionHub::new());
        let outbox: Arc<dyn Outbox> = hub.clone();
        let orchestrator = Orchestrator::new(
            store,
            outbox,
            targets,
            config.engine.clone(),
        );

        let state = Arc::new(ServerState {
            sessions: Mutex::new(SessionManager::new(config.session.clone())),
            hub,
            orchestrator,
            auth,
            codec: JsonCodec,
            config,
        });

        Ok(GeoguessServer { transport, state })
    }
}

impl Default for GeoguessServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Geoguess server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct GeoguessServer<A: Authenticator, S: Store, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<A, S, C>>,
}

impl<A, S, C> GeoguessServer<A, S, C>
where
    A: Authenticator,
    S: Store,
    C: Codec,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, GeoguessError> {
        Ok(self.transport.local_addr()?)
    }

    pub fn orchestrator(&self) -> &Orchestrator<S> {
        &self.state.orchestrator
    }

    pub fn hub(&self) -> &Arc<ConnectionHub> {
        &self.state.hub
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), GeoguessError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes, then stops
    /// accepting and shuts every room down.
    ///
    /// Each accepted connection gets its own handler task.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), GeoguessError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "Geoguess server running");
        let sweeper = tokio::spawn(sweep_sessions(Arc::clone(&self.state)));
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(
                                    error = %e,
                                    "connection ended with error"
                                );
                            }
                        });
                    }
                    Err(TransportError::Shutdown) => break,
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
                () = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break;
                }
            }
        }

        sweeper.abort();
        self.transport.shutdown().await?;
        self.state.orchestrator.shutdown().await;
        Ok(())
    }
}

/// Expires sessions whose reconnect grace ran out. Expiry only drops the
/// session; room memberships stay until the player leaves or the room
/// closes.
async fn sweep_sessions<A, S, C>(state: Arc<ServerState<A, S, C>>)
where
    A: Authenticator,
    S: Store,
    C: Codec,
{
    let mut ticker = tokio::time::interval(state.config.session_sweep_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let expired = {
            let mut sessions = state.sessions.lock().await;
            let expired = sessions.expire_stale();
            sessions.cleanup_expired();
            expired
        };
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "stale sessions expired");
        }
    }
}

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use geoguess::prelude::*;
use tracing_subscriber::EnvFilter;

/// Geoguess multiplayer server.
///
/// Every flag can also be set through the environment variable shown in
/// `--help`.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Address to listen on
    #[arg(short, long, env = "GEOGUESS_BIND", default_value = "127.0.0.1:8080")]
    bind: String,

    /// Seconds a dropped player has to reconnect
    #[arg(long, env = "GEOGUESS_RECONNECT_GRACE", default_value_t = 30)]
    reconnect_grace: u64,

    /// Seconds without a client frame before a connection is dropped
    #[arg(long, env = "GEOGUESS_IDLE_TIMEOUT", default_value_t = 15)]
    idle_timeout: u64,

    /// Ready members required to start a game
    #[arg(long, env = "GEOGUESS_MIN_PLAYERS", default_value_t = 2)]
    min_players: usize,

    /// Seconds a round shows its image before guessing opens (0: no delay)
    #[arg(long, env = "GEOGUESS_REVEAL_DELAY", default_value_t = 0)]
    reveal_delay: u64,

    /// Seconds a finished room lingers before closing (0: until empty)
    #[arg(long, env = "GEOGUESS_FINISHED_ROOM_TTL", default_value_t = 600)]
    finished_room_ttl: u64,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        let mut config = ServerConfig {
            bind_addr: self.bind.clone(),
            idle_timeout: Duration::from_secs(self.idle_timeout),
            session: SessionConfig {
                reconnect_grace_secs: self.reconnect_grace,
            },
            ..ServerConfig::default()
        };
        config.engine.min_players_to_start = self.min_players;
        config.engine.reveal_delay =
            (self.reveal_delay > 0).then(|| Duration::from_secs(self.reveal_delay));
        config.engine.finished_room_ttl = (self.finished_room_ttl > 0)
            .then(|| Duration::from_secs(self.finished_room_ttl));
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), GeoguessError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    tracing::debug!(?args, "starting");

    let server = GeoguessServerBuilder::new()
        .config(args.server_config())
        .build(DevAuthenticator, Arc::new(MemoryStore::new()))
        .await?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
}

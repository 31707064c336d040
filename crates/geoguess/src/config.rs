//! Server configuration.

use std::time::Duration;

use geoguess_room::EngineConfig;
use geoguess_session::SessionConfig;

/// Everything the server needs to start.
///
/// The binary fills this from command-line flags; tests build it directly.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to. Port 0 picks a free port.
    pub bind_addr: String,

    /// How long a new connection has to send its `Hello`.
    pub handshake_timeout: Duration,

    /// A connection that sends nothing (not even a heartbeat) for this
    /// long is dropped.
    pub idle_timeout: Duration,

    /// How often disconnected sessions are checked against their grace
    /// period.
    pub session_sweep_interval: Duration,

    pub session: SessionConfig,
    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            handshake_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(15),
            session_sweep_interval: Duration::from_secs(10),
            session: SessionConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Replaces zero durations, which would drop every connection at once,
    /// with their defaults.
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();
        if self.handshake_timeout.is_zero() {
            tracing::warn!("handshake_timeout 0 is not allowed, using default");
            self.handshake_timeout = defaults.handshake_timeout;
        }
        if self.idle_timeout.is_zero() {
            tracing::warn!("idle_timeout 0 is not allowed, using default");
            self.idle_timeout = defaults.idle_timeout;
        }
        if self.session_sweep_interval.is_zero() {
            self.session_sweep_interval = defaults.session_sweep_interval;
        }
        self.engine = self.engine.validated();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.handshake_timeout, Duration::from_secs(5));
        assert_eq!(config.idle_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_validated_replaces_zero_timeouts() {
        let config = ServerConfig {
            handshake_timeout: Duration::ZERO,
            idle_timeout: Duration::ZERO,
            session_sweep_interval: Duration::ZERO,
            ..ServerConfig::default()
        }
        .validated();
        assert_eq!(config.handshake_timeout, Duration::from_secs(5));
        assert_eq!(config.idle_timeout, Duration::from_secs(15));
        assert_eq!(config.session_sweep_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_validated_passes_engine_through_its_own_clamp() {
        let mut config = ServerConfig::default();
        config.engine.channel_size = 0;
        assert_eq!(config.validated().engine.channel_size, 1);
    }
}

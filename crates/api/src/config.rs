use std::time::Duration;

use crate::auth::credential::CredentialConfig;

/// Server configuration loaded from environment variables.
///
/// All fields except the credential secret have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8080`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Upper bound on each post-shutdown drain step, in seconds (default: `10`).
    pub shutdown_timeout_secs: u64,
    /// Credential signing and session lifetime.
    pub credentials: CredentialConfig,
    /// Live-connection and sweeper tuning.
    pub realtime: RealtimeConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `8080`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`| `10`                       |
    ///
    /// See [`CredentialConfig::from_env`] and [`RealtimeConfig::from_env`] for
    /// the nested sections.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            credentials: CredentialConfig::from_env(),
            realtime: RealtimeConfig::from_env(),
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Tuning of live connections and the background session sweep.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Silence allowed on a connection before it is closed.
    pub heartbeat_timeout_secs: u64,
    /// Period of the expired-session sweep.
    pub sweep_interval_secs: u64,
    /// Broadcast well-formed inbound frames with an unknown `type` to every
    /// connection. When off, only heartbeats and typing frames are routed.
    pub relay_unrecognized_frames: bool,
}

const DEFAULT_HEARTBEAT_TIMEOUT_SECS: u64 = 40;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout_secs: DEFAULT_HEARTBEAT_TIMEOUT_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            relay_unrecognized_frames: true,
        }
    }
}

impl RealtimeConfig {
    /// Load real-time settings from environment variables.
    ///
    /// | Env Var                        | Default |
    /// |--------------------------------|---------|
    /// | `HEARTBEAT_TIMEOUT_SECS`       | `40`    |
    /// | `SESSION_SWEEP_INTERVAL_SECS`  | `3600`  |
    /// | `WS_RELAY_UNRECOGNIZED_FRAMES` | `true`  |
    pub fn from_env() -> Self {
        let heartbeat_timeout_secs: u64 = std::env::var("HEARTBEAT_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_HEARTBEAT_TIMEOUT_SECS.to_string())
            .parse()
            .expect("HEARTBEAT_TIMEOUT_SECS must be a valid u64");
        assert!(heartbeat_timeout_secs > 0, "HEARTBEAT_TIMEOUT_SECS must be positive");

        let sweep_interval_secs: u64 = std::env::var("SESSION_SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| DEFAULT_SWEEP_INTERVAL_SECS.to_string())
            .parse()
            .expect("SESSION_SWEEP_INTERVAL_SECS must be a valid u64");
        assert!(sweep_interval_secs > 0, "SESSION_SWEEP_INTERVAL_SECS must be positive");

        let relay_unrecognized_frames: bool = std::env::var("WS_RELAY_UNRECOGNIZED_FRAMES")
            .unwrap_or_else(|_| "true".into())
            .parse()
            .expect("WS_RELAY_UNRECOGNIZED_FRAMES must be `true` or `false`");

        Self {
            heartbeat_timeout_secs,
            sweep_interval_secs,
            relay_unrecognized_frames,
        }
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

//! Server-wide configuration.
//!
//! One [`ServerConfig`] per listener. Each new session copies its
//! per-session settings (verify flag, compression threshold, proxy route)
//! into its own [`SessionState`], where they can be overridden for that
//! one session through [`SessionHandler::configure`].
//!
//! [`SessionHandler::configure`]: crate::SessionHandler::configure

use std::time::Duration;

use lodestone_keepalive::KeepAliveConfig;
use lodestone_session::{DEFAULT_COMPRESSION_THRESHOLD, ProxyRoute, SessionState};
use tracing::warn;

/// Protocol version this server speaks (1.8).
pub const PROTOCOL_VERSION: i32 = 47;

/// Human-readable name of [`PROTOCOL_VERSION`].
pub const GAME_VERSION: &str = "1.8";

/// How long a verification call may take before the login is abandoned.
pub const DEFAULT_VERIFY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The only protocol version accepted at login.
    pub protocol_version: i32,
    /// Version name used in "outdated" disconnect reasons.
    pub game_version: String,
    /// Server id string for the encryption request and login hash.
    /// Modern servers send an empty string.
    pub server_id: String,
    /// `None` verifies identities. Set `Some(false)` for offline mode.
    pub verify_identity: Option<bool>,
    /// Frames of at least this many bytes get compressed after login.
    pub compression_threshold: i32,
    /// Route for identity verification requests.
    pub proxy_route: ProxyRoute,
    /// Upper bound on one identity verification call.
    pub verify_timeout: Duration,
    pub keep_alive: KeepAliveConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            game_version: GAME_VERSION.to_string(),
            server_id: String::new(),
            verify_identity: None,
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
            proxy_route: ProxyRoute::Direct,
            verify_timeout: DEFAULT_VERIFY_TIMEOUT,
            keep_alive: KeepAliveConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Clamp and fix any out-of-range values so the config is safe to use.
    ///
    /// Called by the listener builder. Rules:
    /// - a zero `verify_timeout` falls back to [`DEFAULT_VERIFY_TIMEOUT`]
    /// - the keep-alive config is validated in turn
    pub fn validated(mut self) -> Self {
        if self.verify_timeout.is_zero() {
            warn!(
                default_secs = DEFAULT_VERIFY_TIMEOUT.as_secs(),
                "verify_timeout is zero, using default"
            );
            self.verify_timeout = DEFAULT_VERIFY_TIMEOUT;
        }
        self.keep_alive = self.keep_alive.validated();
        self
    }

    /// Initial state for a new session.
    pub(crate) fn session_state(&self) -> SessionState {
        SessionState::with_settings(
            self.verify_identity,
            self.compression_threshold,
            self.proxy_route.clone(),
        )
    }
}

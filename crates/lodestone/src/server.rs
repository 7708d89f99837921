//! `ServerListener` builder and the state shared by its sessions.
//!
//! The listener is created once at startup. It owns the process key pair,
//! the configuration, and the hooks, and hands out one
//! [`SessionHandler`] per accepted connection.

use std::sync::Arc;
use std::time::Duration;

use lodestone_session::{IdentityVerifier, ProxyRoute, ServerKeyPair};
use lodestone_transport::Session;

use crate::handler::SessionHandler;
use crate::{LodestoneError, LoginHandler, NoVerifier, ServerConfig, StatusProvider};

/// Shared, read-only server state passed to each session handler.
///
/// Wrapped in `Arc` so it can be cheaply cloned into every session and its
/// background tasks. Nothing in here changes after startup, so no locks.
pub(crate) struct ServerContext<V: IdentityVerifier> {
    pub(crate) config: ServerConfig,
    pub(crate) keys: Arc<ServerKeyPair>,
    pub(crate) verifier: V,
    pub(crate) status_provider: Option<Arc<dyn StatusProvider>>,
    pub(crate) login_handler: Option<Arc<dyn LoginHandler>>,
}

/// Builder for configuring a [`ServerListener`].
///
/// # Example
///
/// ```rust,no_run
/// use lodestone::{PeerInfo, ServerListener};
/// use lodestone_protocol::StatusInfo;
///
/// let listener = ServerListener::builder()
///     .compression_threshold(128)
///     .status_provider(|_: &PeerInfo| StatusInfo::new("1.8", 47, 20, 0, "hello"))
///     .build_offline()?;
/// # Ok::<(), lodestone::LodestoneError>(())
/// ```
pub struct ServerListenerBuilder {
    config: ServerConfig,
    keys: Option<Arc<ServerKeyPair>>,
    status_provider: Option<Arc<dyn StatusProvider>>,
    login_handler: Option<Arc<dyn LoginHandler>>,
}

impl ServerListenerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            keys: None,
            status_provider: None,
            login_handler: None,
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the supported protocol version and its display name.
    pub fn protocol_version(mut self, version: i32, game_version: &str) -> Self {
        self.config.protocol_version = version;
        self.config.game_version = game_version.to_string();
        self
    }

    pub fn server_id(mut self, server_id: &str) -> Self {
        self.config.server_id = server_id.to_string();
        self
    }

    /// `false` enables offline mode for every session by default.
    pub fn verify_identity(mut self, verify: bool) -> Self {
        self.config.verify_identity = Some(verify);
        self
    }

    pub fn compression_threshold(mut self, threshold: i32) -> Self {
        self.config.compression_threshold = threshold;
        self
    }

    pub fn proxy_route(mut self, route: ProxyRoute) -> Self {
        self.config.proxy_route = route;
        self
    }

    pub fn verify_timeout(mut self, timeout: Duration) -> Self {
        self.config.verify_timeout = timeout;
        self
    }

    pub fn keep_alive_interval(mut self, interval: Duration) -> Self {
        self.config.keep_alive.interval = interval;
        self
    }

    /// Uses an existing key pair instead of generating one in `build`.
    pub fn key_pair(mut self, keys: Arc<ServerKeyPair>) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn status_provider(mut self, provider: impl StatusProvider) -> Self {
        self.status_provider = Some(Arc::new(provider));
        self
    }

    pub fn login_handler(mut self, handler: impl LoginHandler) -> Self {
        self.login_handler = Some(Arc::new(handler));
        self
    }

    /// Builds the listener with the given identity verifier.
    ///
    /// Generates the process key pair unless one was supplied.
    ///
    /// # Errors
    /// Returns [`LodestoneError::Session`] if key generation fails.
    pub fn build<V: IdentityVerifier>(
        self,
        verifier: V,
    ) -> Result<ServerListener<V>, LodestoneError> {
        let keys = match self.keys {
            Some(keys) => keys,
            None => Arc::new(ServerKeyPair::generate()?),
        };
        let config = self.config.validated();

        tracing::info!(
            protocol_version = config.protocol_version,
            game_version = %config.game_version,
            verify_identity = config.verify_identity.unwrap_or(true),
            compression_threshold = config.compression_threshold,
            "server listener ready"
        );

        Ok(ServerListener {
            ctx: Arc::new(ServerContext {
                config,
                keys,
                verifier,
                status_provider: self.status_provider,
                login_handler: self.login_handler,
            }),
        })
    }

    /// Builds an offline-mode listener: identities are never verified.
    ///
    /// # Errors
    /// Returns [`LodestoneError::Session`] if key generation fails.
    pub fn build_offline(self) -> Result<ServerListener<NoVerifier>, LodestoneError> {
        self.verify_identity(false).build(NoVerifier)
    }
}

impl Default for ServerListenerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The server side of the login protocol.
///
/// Cheap to clone; every clone shares the same key pair and hooks.
pub struct ServerListener<V: IdentityVerifier> {
    ctx: Arc<ServerContext<V>>,
}

impl<V: IdentityVerifier> Clone for ServerListener<V> {
    fn clone(&self) -> Self {
        Self {
            ctx: Arc::clone(&self.ctx),
        }
    }
}

impl ServerListener<NoVerifier> {
    /// Creates a new builder.
    pub fn builder() -> ServerListenerBuilder {
        ServerListenerBuilder::new()
    }
}

impl<V: IdentityVerifier> ServerListener<V> {
    /// Creates the handler for a freshly connected session.
    ///
    /// Each handler gets its own verify token.
    pub fn accept<S: Session>(&self, session: Arc<S>) -> SessionHandler<S, V> {
        SessionHandler::new(session, Arc::clone(&self.ctx))
    }

    pub fn config(&self) -> &ServerConfig {
        &self.ctx.config
    }

    /// The process key pair shared with every session.
    pub fn key_pair(&self) -> &Arc<ServerKeyPair> {
        &self.ctx.keys
    }
}

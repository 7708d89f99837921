//! Per-connection handler: the phase state machine.
//!
//! One [`SessionHandler`] per accepted connection. The transport's reader
//! feeds it decoded messages in order, either by calling
//! [`SessionHandler::handle`] directly or by handing an mpsc receiver to
//! [`SessionHandler::run`]. The flow is:
//!   1. Handshake → Status or Login, version check on Login
//!   2. Status: answer queries and pings until the peer hangs up
//!   3. Login: encryption request, shared secret, identity verification
//!   4. Game: keep-alive replies update the latency
//!
//! Every error is fatal: the handler sends the phase's disconnect message
//! (if the phase has one) and closes the session.

use std::sync::Arc;
use std::time::Duration;

use lodestone_keepalive::KeepAliveHandle;
use lodestone_protocol::{ClientMessage, HandshakeIntent, Phase, Profile, ProtocolError, ServerMessage};
use lodestone_session::{
    IdentityVerifier, LoginStage, SessionState, SharedState, VerifyToken, offline_profile,
};
use lodestone_transport::{ConnectionId, Session};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::server::ServerContext;
use crate::{LodestoneError, PeerInfo, login};

/// Drives one connection through its phases.
///
/// Cheap to clone: clones share the same session, state and keep-alive
/// task. The verification task holds one.
pub struct SessionHandler<S: Session, V: IdentityVerifier> {
    pub(crate) inner: Arc<SessionInner<S, V>>,
}

pub(crate) struct SessionInner<S: Session, V: IdentityVerifier> {
    pub(crate) session: Arc<S>,
    pub(crate) ctx: Arc<ServerContext<V>>,
    pub(crate) state: SharedState,
    verify_token: VerifyToken,
    keep_alive: parking_lot::Mutex<Option<KeepAliveHandle>>,
}

impl<S: Session, V: IdentityVerifier> Clone for SessionHandler<S, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Session, V: IdentityVerifier> SessionHandler<S, V> {
    pub(crate) fn new(session: Arc<S>, ctx: Arc<ServerContext<V>>) -> Self {
        let state = ctx.config.session_state().shared();
        debug!(conn_id = %session.id(), "session accepted");
        Self {
            inner: Arc::new(SessionInner {
                session,
                ctx,
                state,
                verify_token: VerifyToken::random(),
                keep_alive: parking_lot::Mutex::new(None),
            }),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.inner.session.id()
    }

    pub fn session(&self) -> &Arc<S> {
        &self.inner.session
    }

    /// The shared state. Don't hold the lock across an `.await`.
    pub fn state(&self) -> &SharedState {
        &self.inner.state
    }

    pub fn phase(&self) -> Phase {
        self.inner.state.lock().phase()
    }

    /// Last keep-alive round trip; zero until the first reply matches.
    pub fn latency(&self) -> Duration {
        self.inner.state.lock().latency
    }

    pub fn profile(&self) -> Option<Profile> {
        self.inner.state.lock().profile().cloned()
    }

    /// Snapshot handed to hooks.
    pub fn peer_info(&self) -> PeerInfo {
        let state = self.inner.state.lock();
        PeerInfo {
            conn_id: self.id(),
            phase: state.phase(),
            username: state.username().map(str::to_owned),
            profile: state.profile().cloned(),
            latency: state.latency,
        }
    }

    pub fn is_disconnected(&self) -> bool {
        self.inner.state.lock().is_disconnected() || !self.inner.session.is_connected()
    }

    /// Overrides per-session settings (verify flag, compression threshold,
    /// proxy route) before login starts.
    ///
    /// ```rust,no_run
    /// # fn demo<S: lodestone_transport::Session>(handler: lodestone::SessionHandler<S, lodestone::NoVerifier>) {
    /// handler.configure(|state| state.compression_threshold = -1);
    /// # }
    /// ```
    pub fn configure(&self, f: impl FnOnce(&mut SessionState)) {
        f(&mut *self.inner.state.lock());
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Processes one inbound message.
    ///
    /// Must be called from inside a Tokio runtime: the verified login path
    /// spawns a task. Messages that arrive after a disconnect are dropped.
    ///
    /// # Errors
    /// The error that ended the session. The session has already been
    /// disconnected with that error as the reason when this returns.
    pub fn handle(&self, message: ClientMessage) -> Result<(), LodestoneError> {
        let phase = {
            let state = self.inner.state.lock();
            if state.is_disconnected() {
                trace!(conn_id = %self.id(), message = message.name(), "dropped after disconnect");
                return Ok(());
            }
            state.phase()
        };

        trace!(conn_id = %self.id(), %phase, message = message.name(), "inbound");

        let result = match phase {
            Phase::Handshake => self.on_handshake(message),
            Phase::Status => self.on_status(message),
            Phase::Login => self.on_login(message),
            Phase::Game => self.on_game(message),
        };

        if let Err(err) = &result {
            self.fail(err);
        }
        result
    }

    /// Reads messages until the channel closes or the session ends.
    ///
    /// A closed channel means the peer went away; that is not an error.
    pub async fn run(self, mut inbound: mpsc::Receiver<ClientMessage>) {
        while let Some(message) = inbound.recv().await {
            if self.handle(message).is_err() || self.is_disconnected() {
                break;
            }
        }
        if !self.inner.state.lock().is_disconnected() {
            self.closed();
        }
    }

    fn on_handshake(&self, message: ClientMessage) -> Result<(), LodestoneError> {
        let (protocol_version, intent) = match message {
            ClientMessage::Handshake {
                protocol_version,
                intent,
                ..
            } => (protocol_version, intent),
            other => return Err(unexpected(Phase::Handshake, &other)),
        };

        match intent {
            HandshakeIntent::Status => {
                self.inner.state.lock().advance_phase(Phase::Status)?;
                Ok(())
            }
            HandshakeIntent::Login => {
                // Enter Login before the version check so the peer gets
                // a LoginDisconnect naming the version.
                self.inner.state.lock().advance_phase(Phase::Login)?;
                let config = &self.inner.ctx.config;
                if protocol_version > config.protocol_version {
                    Err(LodestoneError::ServerOutdated {
                        version: config.game_version.clone(),
                    })
                } else if protocol_version < config.protocol_version {
                    Err(LodestoneError::ClientOutdated {
                        version: config.game_version.clone(),
                    })
                } else {
                    Ok(())
                }
            }
            HandshakeIntent::Unknown(raw) => Err(ProtocolError::InvalidIntent(raw).into()),
        }
    }

    fn on_status(&self, message: ClientMessage) -> Result<(), LodestoneError> {
        match message {
            ClientMessage::StatusQuery => {
                let provider = self
                    .inner
                    .ctx
                    .status_provider
                    .as_ref()
                    .ok_or(LodestoneError::MissingStatusProvider)?;
                let info = provider.build_info(&self.peer_info());
                self.inner.session.send(ServerMessage::StatusResponse { info })?;
                Ok(())
            }
            ClientMessage::StatusPing { payload } => {
                self.inner.session.send(ServerMessage::StatusPong { payload })?;
                Ok(())
            }
            other => Err(unexpected(Phase::Status, &other)),
        }
    }

    fn on_login(&self, message: ClientMessage) -> Result<(), LodestoneError> {
        match message {
            ClientMessage::LoginStart { username } => self.on_login_start(username),
            ClientMessage::EncryptionResponse {
                shared_secret,
                verify_token,
            } => self.on_encryption_response(&shared_secret, &verify_token),
            other => Err(unexpected(Phase::Login, &other)),
        }
    }

    fn on_login_start(&self, username: String) -> Result<(), LodestoneError> {
        let verify = {
            let mut state = self.inner.state.lock();
            if state.login_stage() != LoginStage::AwaitingStart {
                return Err(ProtocolError::UnexpectedMessage {
                    phase: Phase::Login,
                    message: "LoginStart",
                }
                .into());
            }
            state.set_username(username.as_str());
            let verify = state.should_verify_identity();
            if verify {
                state.set_login_stage(LoginStage::AwaitingEncryption);
            }
            verify
        };

        debug!(conn_id = %self.id(), %username, verify, "login started");

        if !verify {
            return login::finalize(self, offline_profile(&username));
        }

        let ctx = &self.inner.ctx;
        self.inner.session.send(ServerMessage::EncryptionRequest {
            server_id: ctx.config.server_id.clone(),
            public_key: ctx.keys.public_key_der().to_vec(),
            verify_token: self.inner.verify_token.as_bytes().to_vec(),
        })?;
        Ok(())
    }

    fn on_encryption_response(
        &self,
        shared_secret: &[u8],
        verify_token: &[u8],
    ) -> Result<(), LodestoneError> {
        if self.inner.state.lock().login_stage() != LoginStage::AwaitingEncryption {
            return Err(ProtocolError::UnexpectedMessage {
                phase: Phase::Login,
                message: "EncryptionResponse",
            }
            .into());
        }

        let key = self
            .inner
            .ctx
            .keys
            .accept_response(&self.inner.verify_token, verify_token, shared_secret)?;

        {
            let mut state = self.inner.state.lock();
            state.install_key(key.clone())?;
            state.set_login_stage(LoginStage::Verifying);
        }

        self.inner.session.enable_encryption(&key)?;
        debug!(conn_id = %self.id(), "encryption enabled");

        login::spawn_verification(self.clone(), key);
        Ok(())
    }

    fn on_game(&self, message: ClientMessage) -> Result<(), LodestoneError> {
        match message {
            ClientMessage::KeepAliveReply { id } => {
                let now = tokio::time::Instant::now();
                let rtt = self.inner.state.lock().acknowledge_ping(id, now);
                match rtt {
                    Some(rtt) => {
                        trace!(conn_id = %self.id(), id, rtt_ms = rtt.as_millis() as u64, "keep-alive matched");
                    }
                    None => trace!(conn_id = %self.id(), id, "stale keep-alive reply"),
                }
            }
            other => trace!(conn_id = %self.id(), message = other.name(), "game message ignored"),
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Ends the session with `reason`.
    ///
    /// In Login and Game the peer is sent the phase's disconnect message
    /// first. Only the first call has any effect.
    pub fn disconnect(&self, reason: &str, cause: Option<&(dyn std::error::Error + 'static)>) {
        let phase = {
            let mut state = self.inner.state.lock();
            if !state.mark_disconnected() {
                return;
            }
            state.phase()
        };

        let notice = match phase {
            Phase::Login => Some(ServerMessage::LoginDisconnect {
                reason: reason.to_string(),
            }),
            Phase::Game => Some(ServerMessage::GameDisconnect {
                reason: reason.to_string(),
            }),
            Phase::Handshake | Phase::Status => None,
        };
        if let Some(notice) = notice {
            if let Err(e) = self.inner.session.send(notice) {
                debug!(conn_id = %self.id(), error = %e, "disconnect notice not sent");
            }
        }

        self.stop_keep_alive();
        info!(conn_id = %self.id(), %phase, reason, "session disconnected");
        self.inner.session.disconnect(reason, cause);
    }

    /// Records that the peer closed the connection. Sends nothing.
    pub fn closed(&self) {
        let phase = {
            let mut state = self.inner.state.lock();
            if !state.mark_disconnected() {
                return;
            }
            state.phase()
        };
        self.stop_keep_alive();
        info!(conn_id = %self.id(), %phase, "session closed by peer");
    }

    pub(crate) fn fail(&self, err: &LodestoneError) {
        if err.is_security_relevant() {
            warn!(conn_id = %self.id(), error = %err, "session failed");
        } else {
            info!(conn_id = %self.id(), error = %err, "session failed");
        }
        let cause = std::error::Error::source(err).unwrap_or(err);
        self.disconnect(&err.to_string(), Some(cause));
    }

    /// Starts the keep-alive task unless one is already running.
    pub(crate) fn start_keep_alive(&self) {
        if self.inner.state.lock().is_disconnected() {
            return;
        }
        let mut slot = self.inner.keep_alive.lock();
        if slot.is_none() {
            *slot = Some(lodestone_keepalive::spawn(
                Arc::clone(&self.inner.session),
                Arc::clone(&self.inner.state),
                self.inner.ctx.config.keep_alive.clone(),
            ));
        }
    }

    /// Number of keep-alive probes sent, if the task was started.
    pub fn keep_alive_probes(&self) -> Option<u64> {
        self.inner.keep_alive.lock().as_ref().map(KeepAliveHandle::probes_sent)
    }

    fn stop_keep_alive(&self) {
        if let Some(handle) = self.inner.keep_alive.lock().take() {
            handle.stop();
        }
    }
}

fn unexpected(phase: Phase, message: &ClientMessage) -> LodestoneError {
    ProtocolError::UnexpectedMessage {
        phase,
        message: message.name(),
    }
    .into()
}

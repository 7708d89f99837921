//! Typed per-session state.
//!
//! One [`SessionState`] per connection, shared between the dispatch task,
//! the identity verification task and the keep-alive task as
//! [`SharedState`]. Every field that used to be a loose "flag" has a name
//! and a type here, and the write-once fields (profile, encryption key)
//! refuse a second write.
//!
//! Locking rule: hold the mutex for short synchronous sections only, never
//! across an `.await`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use lodestone_protocol::{Phase, Profile, ProtocolError};
use lodestone_transport::EncryptionKey;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::SessionError;

/// Compression threshold used when the server config doesn't set one.
pub const DEFAULT_COMPRESSION_THRESHOLD: i32 = 256;

/// The state handle shared by a session's tasks.
pub type SharedState = Arc<Mutex<SessionState>>;

// ---------------------------------------------------------------------------
// LoginStage
// ---------------------------------------------------------------------------

/// Progress through the login phase.
///
/// ```text
/// AwaitingStart ──(verified)──→ AwaitingEncryption ──→ Verifying ──→ Complete
///       │                                                              ↑
///       └──────────────────────(offline)───────────────────────────────┘
/// ```
///
/// `AwaitingEncryption` is the only stage in which an encryption response
/// is accepted, which is what makes the verify token single-use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginStage {
    #[default]
    AwaitingStart,
    AwaitingEncryption,
    Verifying,
    Complete,
}

// ---------------------------------------------------------------------------
// ProxyRoute
// ---------------------------------------------------------------------------

/// How the identity verification request reaches the service.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProxyRoute {
    #[default]
    Direct,
    Http(SocketAddr),
    Socks5(SocketAddr),
}

// ---------------------------------------------------------------------------
// PingState
// ---------------------------------------------------------------------------

/// The most recent keep-alive probe: single slot, latest wins.
///
/// There is no history. Emitting a new probe forgets the previous one, so
/// a late reply to an older probe simply doesn't match.
#[derive(Debug, Clone, Copy, Default)]
pub struct PingState {
    last_id: i32,
    issued_at: Option<Instant>,
}

impl PingState {
    /// Keep-alive id for a wall-clock timestamp: the low 32 bits.
    pub fn id_from_millis(millis: u64) -> i32 {
        millis as i32
    }

    /// Records a freshly emitted probe, overwriting any unacknowledged one.
    pub fn issue(&mut self, id: i32, at: Instant) {
        self.last_id = id;
        self.issued_at = Some(at);
    }

    pub fn last_id(&self) -> i32 {
        self.last_id
    }

    pub fn issued_at(&self) -> Option<Instant> {
        self.issued_at
    }

    /// Round-trip time if `id` answers the most recent probe.
    pub fn round_trip(&self, id: i32, now: Instant) -> Option<Duration> {
        match self.issued_at {
            Some(at) if id == self.last_id => Some(now.saturating_duration_since(at)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Everything the login state machine knows about one connection.
#[derive(Debug, Clone)]
pub struct SessionState {
    phase: Phase,
    login_stage: LoginStage,
    username: Option<String>,
    profile: Option<Profile>,
    encryption_key: Option<EncryptionKey>,
    disconnected: bool,
    /// `None` means "not configured", which verifies.
    pub verify_identity: Option<bool>,
    pub compression_threshold: i32,
    pub proxy_route: ProxyRoute,
    pub ping: PingState,
    /// Last measured keep-alive round trip. Zero until the first match.
    pub latency: Duration,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::with_settings(None, DEFAULT_COMPRESSION_THRESHOLD, ProxyRoute::Direct)
    }
}

impl SessionState {
    /// Fresh state in the handshake phase with the given per-session settings.
    pub fn with_settings(
        verify_identity: Option<bool>,
        compression_threshold: i32,
        proxy_route: ProxyRoute,
    ) -> Self {
        Self {
            phase: Phase::Handshake,
            login_stage: LoginStage::AwaitingStart,
            username: None,
            profile: None,
            encryption_key: None,
            disconnected: false,
            verify_identity,
            compression_threshold,
            proxy_route,
            ping: PingState::default(),
            latency: Duration::ZERO,
        }
    }

    /// Wraps the state for sharing across a session's tasks.
    pub fn shared(self) -> SharedState {
        Arc::new(Mutex::new(self))
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Moves to `next`, rejecting regressions and skipped phases.
    ///
    /// # Errors
    /// [`ProtocolError::PhaseRegression`] for a disallowed transition.
    pub fn advance_phase(&mut self, next: Phase) -> Result<(), ProtocolError> {
        let from = self.phase;
        self.phase = from.advance(next)?;
        tracing::debug!(from = %from, to = %next, "phase advanced");
        Ok(())
    }

    /// The verify-identity flag with its default applied: unset verifies.
    pub fn should_verify_identity(&self) -> bool {
        self.verify_identity.unwrap_or(true)
    }

    pub fn login_stage(&self) -> LoginStage {
        self.login_stage
    }

    pub fn set_login_stage(&mut self, stage: LoginStage) {
        self.login_stage = stage;
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn set_username(&mut self, username: impl Into<String>) {
        self.username = Some(username.into());
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    /// # Errors
    /// [`SessionError::ProfileAlreadySet`] if a profile was assigned before.
    pub fn set_profile(&mut self, profile: Profile) -> Result<(), SessionError> {
        if self.profile.is_some() {
            return Err(SessionError::ProfileAlreadySet);
        }
        self.profile = Some(profile);
        Ok(())
    }

    pub fn encryption_key(&self) -> Option<&EncryptionKey> {
        self.encryption_key.as_ref()
    }

    /// # Errors
    /// [`SessionError::KeyAlreadyInstalled`] if a key was installed before.
    pub fn install_key(&mut self, key: EncryptionKey) -> Result<(), SessionError> {
        if self.encryption_key.is_some() {
            return Err(SessionError::KeyAlreadyInstalled);
        }
        self.encryption_key = Some(key);
        Ok(())
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    /// Enters the terminal state. Returns `true` only for the first call.
    pub fn mark_disconnected(&mut self) -> bool {
        !std::mem::replace(&mut self.disconnected, true)
    }

    /// Matches a keep-alive reply against the latest probe and, on a match,
    /// stores the round trip as the session latency.
    pub fn acknowledge_ping(&mut self, id: i32, now: Instant) -> Option<Duration> {
        let rtt = self.ping.round_trip(id, now)?;
        self.latency = rtt;
        Some(rtt)
    }
}

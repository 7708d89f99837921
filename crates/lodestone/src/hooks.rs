//! Application hooks: status provider, login callback, identity verifier.
//!
//! Hooks are called synchronously from the session's dispatch context (or,
//! for the login callback on the verified path, from its verification
//! task). They receive a [`PeerInfo`] snapshot, never the live state, so
//! they can't hold the session lock.
//!
//! Closures work for the first two:
//!
//! ```rust
//! use lodestone::{LoginHandler, PeerInfo, StatusProvider};
//! use lodestone_protocol::StatusInfo;
//!
//! let status = |_: &PeerInfo| StatusInfo::new("1.8", 47, 20, 0, "hello");
//! let on_login = |peer: &PeerInfo| println!("{:?} logged in", peer.username);
//!
//! fn assert_hooks(_: impl StatusProvider, _: impl LoginHandler) {}
//! assert_hooks(status, on_login);
//! ```

use std::time::Duration;

use lodestone_protocol::{Phase, Profile, StatusInfo};
use lodestone_session::{IdentityVerifier, ProxyRoute, VerifyError};
use lodestone_transport::ConnectionId;

/// Read-only snapshot of a session handed to hooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    pub conn_id: ConnectionId,
    pub phase: Phase,
    pub username: Option<String>,
    pub profile: Option<Profile>,
    pub latency: Duration,
}

/// Builds the server-list status payload.
pub trait StatusProvider: Send + Sync + 'static {
    fn build_info(&self, peer: &PeerInfo) -> StatusInfo;
}

impl<F> StatusProvider for F
where
    F: Fn(&PeerInfo) -> StatusInfo + Send + Sync + 'static,
{
    fn build_info(&self, peer: &PeerInfo) -> StatusInfo {
        self(peer)
    }
}

/// Told about every completed login, right after the session enters Game.
pub trait LoginHandler: Send + Sync + 'static {
    fn logged_in(&self, peer: &PeerInfo);
}

impl<F> LoginHandler for F
where
    F: Fn(&PeerInfo) + Send + Sync + 'static,
{
    fn logged_in(&self, peer: &PeerInfo) {
        self(peer)
    }
}

/// Verifier for listeners that never verify (offline mode).
///
/// If a session opts back into verification it fails cleanly with a
/// verification error instead of logging anyone in.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVerifier;

impl IdentityVerifier for NoVerifier {
    async fn verify(
        &self,
        _username: &str,
        _server_hash: &str,
        _route: &ProxyRoute,
    ) -> Result<Option<Profile>, VerifyError> {
        Err(VerifyError::Request(
            "no identity verifier configured".to_string(),
        ))
    }
}

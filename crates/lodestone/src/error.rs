//! Unified error type for the Lodestone session handler.

use lodestone_protocol::ProtocolError;
use lodestone_session::{SessionError, VerifyError};
use lodestone_transport::TransportError;

/// Every way a session can fail.
///
/// All variants are fatal for the session that raised them. The `Display`
/// text doubles as the human-readable disconnect reason, so wording here is
/// part of what the player sees.
#[derive(Debug, thiserror::Error)]
pub enum LodestoneError {
    /// The transport refused a send or a mode switch.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The peer broke the protocol (unexpected message, unknown intent).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Authentication or crypto failure during login.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The client speaks a newer protocol than we do.
    #[error("server outdated, server is on version {version}")]
    ServerOutdated { version: String },

    /// The client speaks an older protocol than we do.
    #[error("client outdated, use version {version}")]
    ClientOutdated { version: String },

    /// A status query arrived but no status provider is registered.
    #[error("no server info builder set")]
    MissingStatusProvider,

    /// The identity service answered and did not vouch for the player.
    #[error("failed to verify username")]
    VerificationRejected,

    /// The identity service could not be asked.
    #[error("failed to make verification request")]
    VerificationFailed(#[source] VerifyError),
}

impl LodestoneError {
    /// Failures worth a `warn!`: the peer either failed authentication or
    /// broke the protocol.
    pub fn is_security_relevant(&self) -> bool {
        matches!(
            self,
            Self::Protocol(_) | Self::Session(_) | Self::VerificationRejected
        )
    }
}

//! Error types for the protocol layer.
//!
//! Each crate in Lodestone defines its own error enum, so a
//! `ProtocolError` always means "the peer broke the protocol rules", never
//! a network or crypto failure.

use crate::Phase;

/// Errors that can occur in the protocol layer.
///
/// All of these are fatal for the connection that caused them: the
/// session handler tears the connection down without trying to recover.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A message arrived that is not valid in the current phase (or the
    /// current step of the login sequence).
    #[error("unexpected {message} during {phase} phase")]
    UnexpectedMessage {
        phase: Phase,
        message: &'static str,
    },

    /// The handshake declared an intent other than status or login.
    #[error("invalid client intent: {0}")]
    InvalidIntent(i32),

    /// A phase transition would move backwards or skip a phase.
    #[error("illegal phase transition: {from} -> {to}")]
    PhaseRegression { from: Phase, to: Phase },

    /// Serialization of a JSON payload failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),
}

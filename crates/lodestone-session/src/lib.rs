//! Per-session login state for Lodestone.
//!
//! This crate holds what a single connection knows while it logs in:
//!
//! 1. **State**: phase, login stage, profile, keep-alive probe and
//!    latency ([`SessionState`], shared as [`SharedState`])
//! 2. **Crypto**: the process key pair, verify tokens, the login hash and
//!    offline profile ids ([`ServerKeyPair`], [`VerifyToken`])
//! 3. **Verification**: the hook for the identity service
//!    ([`IdentityVerifier`] trait)
//!
//! # How it fits in the stack
//!
//! ```text
//! Session handler (above)  ← drives the phase machine over this state
//!     ↕
//! Session layer (this crate)  ← typed state, crypto, verification hook
//!     ↕
//! Transport / Protocol (below)  ← EncryptionKey, Phase, Profile
//! ```

mod auth;
mod crypto;
mod error;
mod state;

pub use auth::{IdentityVerifier, VerifyError};
pub use crypto::{
    OFFLINE_NAMESPACE, ServerKeyPair, VerifyToken, offline_profile, offline_uuid, server_id_hash,
    signed_hex_digest,
};
pub use error::SessionError;
pub use state::{
    DEFAULT_COMPRESSION_THRESHOLD, LoginStage, PingState, ProxyRoute, SessionState, SharedState,
};

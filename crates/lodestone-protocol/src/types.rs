//! Core protocol types for Lodestone's login protocol.
//!
//! Everything here is a *logical* message: the framing, VarInt field
//! encoding and packet ids belong to the codec layer, which turns bytes
//! into these enums before the session handler ever sees them.
//!
//! Think of this as the vocabulary the client and server share during the
//! four phases of a connection.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ProtocolError, StatusInfo};

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// The stage of a connection's lifecycle.
///
/// Each phase has its own message set. A connection starts in
/// `Handshake` and only ever moves forward:
///
/// ```text
///   Handshake ──(intent: status)──→ Status
///       │
///       └─────(intent: login)───→ Login ──(login success)──→ Game
/// ```
///
/// The derived `Ord` follows declaration order, so `Phase::Game >
/// Phase::Login` holds. Disconnection is not a phase: it can happen from
/// any of them and is tracked next to the phase in the session state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Waiting for the client's handshake.
    #[default]
    Handshake,
    /// Server-list query: status request and ping.
    Status,
    /// Authentication, encryption, and compression setup.
    Login,
    /// Fully logged in.
    Game,
}

impl Phase {
    /// Whether `self → next` is one of the allowed transitions.
    ///
    /// Status is a dead end, and Game is only reachable from Login.
    pub fn can_advance_to(self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Phase::Handshake, Phase::Status)
                | (Phase::Handshake, Phase::Login)
                | (Phase::Login, Phase::Game)
        )
    }

    /// Validates and performs a transition, returning the new phase.
    ///
    /// # Errors
    /// Returns [`ProtocolError::PhaseRegression`] for any transition not
    /// allowed by [`can_advance_to`](Self::can_advance_to).
    pub fn advance(self, next: Phase) -> Result<Phase, ProtocolError> {
        if self.can_advance_to(next) {
            Ok(next)
        } else {
            Err(ProtocolError::PhaseRegression {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Handshake => "handshake",
            Phase::Status => "status",
            Phase::Login => "login",
            Phase::Game => "game",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// HandshakeIntent
// ---------------------------------------------------------------------------

/// What the client wants to do after the handshake ("next state").
///
/// On the wire this is a VarInt: 1 = status, 2 = login. Anything else is
/// kept as `Unknown` so the server can reject it explicitly instead of the
/// codec silently dropping the packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandshakeIntent {
    Status,
    Login,
    Unknown(i32),
}

impl HandshakeIntent {
    /// Maps the raw wire value to an intent.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Self::Status,
            2 => Self::Login,
            other => Self::Unknown(other),
        }
    }

    /// The raw wire value.
    pub fn to_raw(self) -> i32 {
        match self {
            Self::Status => 1,
            Self::Login => 2,
            Self::Unknown(raw) => raw,
        }
    }
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// An identity bound to a session: a stable id plus a display name.
///
/// Either synthesized from the username (offline mode) or returned by the
/// identity verification service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub name: String,
}

impl Profile {
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// Messages the server receives, across all phases.
///
/// `#[serde(tag = "type")]` produces `{ "type": "LoginStart", "username": .. }`,
/// which is what the JSON debugging codec and test fixtures use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    // -- Handshake --
    /// The first message of every connection.
    Handshake {
        protocol_version: i32,
        server_address: String,
        server_port: u16,
        intent: HandshakeIntent,
    },

    // -- Status --
    /// "Tell me about this server."
    StatusQuery,
    /// Latency probe for the server list. The payload is echoed back.
    StatusPing { payload: i64 },

    // -- Login --
    /// Starts the login with the name the player wants to use.
    LoginStart { username: String },
    /// Both fields are RSA-encrypted with the server's public key.
    EncryptionResponse {
        shared_secret: Vec<u8>,
        verify_token: Vec<u8>,
    },

    // -- Game --
    /// Answer to a [`ServerMessage::KeepAliveRequest`].
    KeepAliveReply { id: i32 },
    /// Any other game-phase packet, carried opaquely for game listeners.
    Game { packet_id: i32, data: Vec<u8> },
}

impl ClientMessage {
    /// Short message name for logs and protocol errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Handshake { .. } => "Handshake",
            Self::StatusQuery => "StatusQuery",
            Self::StatusPing { .. } => "StatusPing",
            Self::LoginStart { .. } => "LoginStart",
            Self::EncryptionResponse { .. } => "EncryptionResponse",
            Self::KeepAliveReply { .. } => "KeepAliveReply",
            Self::Game { .. } => "Game",
        }
    }
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// Messages the server sends, across all phases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    // -- Status --
    StatusResponse { info: StatusInfo },
    StatusPong { payload: i64 },

    // -- Login --
    /// Asks the client to encrypt a fresh shared secret.
    /// `public_key` is the DER-encoded SubjectPublicKeyInfo.
    EncryptionRequest {
        server_id: String,
        public_key: Vec<u8>,
        verify_token: Vec<u8>,
    },
    /// Frames at or above `threshold` bytes are compressed from now on.
    SetCompression { threshold: i32 },
    LoginSuccess { profile: Profile },
    LoginDisconnect { reason: String },

    // -- Game --
    KeepAliveRequest { id: i32 },
    GameDisconnect { reason: String },
}

impl ServerMessage {
    /// Short message name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::StatusResponse { .. } => "StatusResponse",
            Self::StatusPong { .. } => "StatusPong",
            Self::EncryptionRequest { .. } => "EncryptionRequest",
            Self::SetCompression { .. } => "SetCompression",
            Self::LoginSuccess { .. } => "LoginSuccess",
            Self::LoginDisconnect { .. } => "LoginDisconnect",
            Self::KeepAliveRequest { .. } => "KeepAliveRequest",
            Self::GameDisconnect { .. } => "GameDisconnect",
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

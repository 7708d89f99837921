//! Transport abstraction layer for Lodestone.
//!
//! The transport owns the socket, the frame codec, the AES/CFB8 cipher and
//! the zlib compressor. The session handler never touches any of those
//! directly. It talks to a connected peer through the [`Session`] trait:
//! send a message, flip the encryption and compression switches, and close.
//!
//! # Feature Flags
//!
//! - `channel` (default): [`ChannelSession`], a [`Session`] that queues
//!   [`Outbound`] events on an mpsc channel for a transport writer task.

mod error;
#[cfg(feature = "channel")]
mod channel;

#[cfg(feature = "channel")]
pub use channel::{ChannelSession, Outbound};
pub use error::TransportError;

use std::fmt;

use lodestone_protocol::ServerMessage;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// The 128-bit AES key negotiated during login.
///
/// The same bytes serve as key and IV for the stream cipher, so they are
/// never printed: `Debug` is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey([u8; EncryptionKey::LEN]);

impl EncryptionKey {
    /// Key length in bytes.
    pub const LEN: usize = 16;

    pub fn new(bytes: [u8; Self::LEN]) -> Self {
        Self(bytes)
    }

    /// Builds a key from a decrypted shared secret.
    ///
    /// Returns `None` unless `bytes` is exactly [`Self::LEN`] long.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; Self::LEN]>::try_from(bytes).ok().map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

/// A connected peer, as seen by the session handler.
///
/// Implementations are owned by the transport. Every method is synchronous
/// and must not block: implementations queue work for their writer task
/// and return.
///
/// Ordering matters. Mode switches apply to every frame sent *after* the
/// call, so `set_compression_threshold` followed by `send` yields a
/// compressed (and, if enabled earlier, encrypted) frame.
pub trait Session: Send + Sync + 'static {
    /// The connection this session belongs to.
    fn id(&self) -> ConnectionId;

    /// Queues a message for the peer.
    ///
    /// # Errors
    /// [`TransportError::ConnectionClosed`] once the connection is closed.
    fn send(&self, message: ServerMessage) -> Result<(), TransportError>;

    /// Closes the connection. `cause` is for diagnostics only and never
    /// reaches the peer. Closing twice is a no-op.
    fn disconnect(&self, reason: &str, cause: Option<&(dyn std::error::Error + 'static)>);

    /// Switches the connection to encrypted mode, permanently.
    ///
    /// # Errors
    /// [`TransportError::EncryptionAlreadyEnabled`] on a second call.
    fn enable_encryption(&self, key: &EncryptionKey) -> Result<(), TransportError>;

    /// Compresses every later frame whose size is at least `threshold`.
    /// A negative threshold disables compression.
    fn set_compression_threshold(&self, threshold: i32) -> Result<(), TransportError>;

    /// Whether the connection is still open.
    fn is_connected(&self) -> bool;
}

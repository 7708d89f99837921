//! Channel-backed [`Session`] implementation.
//!
//! `ChannelSession` doesn't write to a socket. It turns each call into an
//! [`Outbound`] event on an unbounded mpsc channel, and the transport's
//! writer task drains that channel in order: frames, cipher and compressor
//! switches, and the final close. A single queue keeps "enable compression,
//! then send login success" in the right order even when the calls come
//! from different tasks.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;

use lodestone_protocol::ServerMessage;
use tokio::sync::mpsc;

use crate::{ConnectionId, EncryptionKey, Session, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Sentinel for "no compression threshold set yet".
const COMPRESSION_UNSET: i32 = i32::MIN;

/// One event for the transport writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Encode and write a frame.
    Message(ServerMessage),
    /// Install the cipher; applies to every frame after this event.
    EnableEncryption(EncryptionKey),
    /// Install the compressor; applies to every frame after this event.
    SetCompression(i32),
    /// Flush and close the socket.
    Close {
        reason: String,
        cause: Option<String>,
    },
}

/// A [`Session`] that queues [`Outbound`] events for a writer task.
#[derive(Debug)]
pub struct ChannelSession {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<Outbound>,
    connected: AtomicBool,
    encrypted: AtomicBool,
    compression_threshold: AtomicI32,
}

impl ChannelSession {
    /// Creates a session with a fresh connection id.
    ///
    /// The receiver goes to the transport writer. Dropping it closes the
    /// session on the next send.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Outbound>) {
        let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        Self::with_id(id)
    }

    /// Creates a session for an id assigned by the transport.
    pub fn with_id(id: ConnectionId) -> (Arc<Self>, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Arc::new(Self {
            id,
            tx,
            connected: AtomicBool::new(true),
            encrypted: AtomicBool::new(false),
            compression_threshold: AtomicI32::new(COMPRESSION_UNSET),
        });
        tracing::debug!(%id, "channel session opened");
        (session, rx)
    }

    /// Records that the peer went away (read side saw EOF or an error).
    ///
    /// Unlike [`Session::disconnect`] this queues no `Close` event: there
    /// is nobody left to flush to.
    pub fn mark_closed(&self) {
        if self.connected.swap(false, Ordering::AcqRel) {
            tracing::debug!(id = %self.id, "channel session closed by peer");
        }
    }

    /// Whether encryption has been switched on.
    pub fn is_encrypted(&self) -> bool {
        self.encrypted.load(Ordering::Acquire)
    }

    /// The active compression threshold, if one was set.
    pub fn compression_threshold(&self) -> Option<i32> {
        match self.compression_threshold.load(Ordering::Acquire) {
            COMPRESSION_UNSET => None,
            threshold => Some(threshold),
        }
    }

    fn push(&self, event: Outbound) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::ConnectionClosed(self.id));
        }
        self.tx.send(event).map_err(|_| {
            // Writer task is gone; nothing we queue will ever be written.
            self.connected.store(false, Ordering::Release);
            TransportError::ConnectionClosed(self.id)
        })
    }
}

impl Session for ChannelSession {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, message: ServerMessage) -> Result<(), TransportError> {
        tracing::trace!(id = %self.id, message = message.name(), "queue message");
        self.push(Outbound::Message(message))
    }

    fn disconnect(&self, reason: &str, cause: Option<&(dyn std::error::Error + 'static)>) {
        if !self.connected.swap(false, Ordering::AcqRel) {
            return;
        }
        tracing::debug!(id = %self.id, reason, "closing channel session");
        // The writer may already be gone; a close it never sees is fine.
        let _ = self.tx.send(Outbound::Close {
            reason: reason.to_string(),
            cause: cause.map(|e| e.to_string()),
        });
    }

    fn enable_encryption(&self, key: &EncryptionKey) -> Result<(), TransportError> {
        if self.encrypted.swap(true, Ordering::AcqRel) {
            return Err(TransportError::EncryptionAlreadyEnabled(self.id));
        }
        self.push(Outbound::EnableEncryption(key.clone()))
    }

    fn set_compression_threshold(&self, threshold: i32) -> Result<(), TransportError> {
        self.push(Outbound::SetCompression(threshold))?;
        self.compression_threshold.store(threshold, Ordering::Release);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

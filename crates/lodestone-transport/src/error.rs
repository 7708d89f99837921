use crate::ConnectionId;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed, by either side.
    #[error("connection closed: {0}")]
    ConnectionClosed(ConnectionId),

    /// Encryption is permanent once enabled; a second key is refused.
    #[error("encryption already enabled on {0}")]
    EncryptionAlreadyEnabled(ConnectionId),
}

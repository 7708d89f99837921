//! Error types for the session layer.

/// Errors that can occur while holding or mutating a session's login state.
///
/// Most of these are authentication failures: the peer sent something the
/// login handshake can't accept. They are all fatal for that session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The decrypted verify token doesn't match the one we issued.
    #[error("invalid nonce")]
    InvalidNonce,

    /// RSA decryption of the encryption response failed.
    #[error("failed to decrypt login payload: {0}")]
    Decrypt(#[source] rsa::Error),

    /// The decrypted shared secret is not an AES-128 key.
    #[error("shared secret must be 16 bytes, got {0}")]
    InvalidSharedSecret(usize),

    /// A session's encryption key is write-once.
    #[error("encryption key already installed")]
    KeyAlreadyInstalled,

    /// A session's profile is write-once.
    #[error("profile already assigned")]
    ProfileAlreadySet,

    /// RSA key pair generation failed at startup.
    #[error("failed to generate server key pair: {0}")]
    KeyGeneration(#[source] rsa::Error),

    /// The public key couldn't be DER-encoded.
    #[error("failed to encode server public key: {0}")]
    KeyEncoding(String),
}

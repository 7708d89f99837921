//! Login cryptography.
//!
//! The login handshake uses three primitives:
//!
//! 1. **RSA** (PKCS#1 v1.5): the client encrypts a fresh AES key and our
//!    verify token with the server's public key. One key pair per process.
//! 2. **SHA-1**: the "server hash" both sides send to the identity service,
//!    rendered as a *signed* hex big integer (so it may start with `-`).
//! 3. **MD5**: offline-mode profile ids are name-based (version 3) UUIDs of
//!    `"OfflinePlayer:" + username`.

use std::fmt;

use lodestone_protocol::Profile;
use lodestone_transport::EncryptionKey;
use num_bigint::BigInt;
use rand::Rng;
use rand_core::OsRng;
use rsa::pkcs8::EncodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use sha1::{Digest, Sha1};
use uuid::Uuid;

use crate::SessionError;

/// Prefix hashed together with the username for offline profile ids.
pub const OFFLINE_NAMESPACE: &str = "OfflinePlayer:";

// ---------------------------------------------------------------------------
// ServerKeyPair
// ---------------------------------------------------------------------------

/// The process-wide RSA key pair.
///
/// Generated once at startup and shared read-only (behind an `Arc`) by every
/// session. Never regenerated per session.
pub struct ServerKeyPair {
    private: RsaPrivateKey,
    public: RsaPublicKey,
    public_der: Vec<u8>,
}

impl ServerKeyPair {
    /// Key size the vanilla client expects.
    pub const BITS: usize = 1024;

    /// Generates a fresh [`Self::BITS`]-bit key pair.
    ///
    /// # Errors
    /// [`SessionError::KeyGeneration`] if the RNG or prime search fails.
    pub fn generate() -> Result<Self, SessionError> {
        let private =
            RsaPrivateKey::new(&mut OsRng, Self::BITS).map_err(SessionError::KeyGeneration)?;
        Self::from_private_key(private)
    }

    /// Wraps an existing private key.
    ///
    /// # Errors
    /// [`SessionError::KeyEncoding`] if the public half can't be DER-encoded.
    pub fn from_private_key(private: RsaPrivateKey) -> Result<Self, SessionError> {
        let public = private.to_public_key();
        let public_der = public
            .to_public_key_der()
            .map_err(|e| SessionError::KeyEncoding(e.to_string()))?
            .as_bytes()
            .to_vec();
        Ok(Self {
            private,
            public,
            public_der,
        })
    }

    /// X.509 SubjectPublicKeyInfo DER bytes, as sent in the encryption request.
    pub fn public_key_der(&self) -> &[u8] {
        &self.public_der
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    /// Decrypts a PKCS#1 v1.5 block encrypted with our public key.
    ///
    /// # Errors
    /// [`SessionError::Decrypt`] on malformed ciphertext or padding.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, SessionError> {
        self.private
            .decrypt(Pkcs1v15Encrypt, ciphertext)
            .map_err(SessionError::Decrypt)
    }

    /// Validates an encryption response and recovers the session key.
    ///
    /// The token is checked first: on mismatch we never look at the secret.
    ///
    /// # Errors
    /// - [`SessionError::Decrypt`]: either field fails to decrypt
    /// - [`SessionError::InvalidNonce`]: token mismatch
    /// - [`SessionError::InvalidSharedSecret`]: secret isn't 16 bytes
    pub fn accept_response(
        &self,
        expected: &VerifyToken,
        encrypted_token: &[u8],
        encrypted_secret: &[u8],
    ) -> Result<EncryptionKey, SessionError> {
        let token = self.decrypt(encrypted_token)?;
        if !expected.matches(&token) {
            return Err(SessionError::InvalidNonce);
        }

        let secret = self.decrypt(encrypted_secret)?;
        EncryptionKey::from_slice(&secret).ok_or(SessionError::InvalidSharedSecret(secret.len()))
    }
}

impl fmt::Debug for ServerKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerKeyPair")
            .field("public_der_len", &self.public_der.len())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// VerifyToken
// ---------------------------------------------------------------------------

/// Per-session nonce proving the client can encrypt to our public key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct VerifyToken([u8; 4]);

impl VerifyToken {
    /// Four fresh random bytes.
    pub fn random() -> Self {
        Self(rand::rng().random())
    }

    pub fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Byte-for-byte comparison; a candidate of any other length never matches.
    pub fn matches(&self, candidate: &[u8]) -> bool {
        candidate == self.0.as_slice()
    }
}

impl fmt::Debug for VerifyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VerifyToken(..)")
    }
}

// ---------------------------------------------------------------------------
// Hashes
// ---------------------------------------------------------------------------

/// SHA-1 over `parts`, formatted as a signed big-endian integer in hex.
///
/// A digest with the top bit set is negative in two's complement, so the
/// output is `-` followed by the magnitude. Leading zeros are dropped.
pub fn signed_hex_digest(parts: &[&[u8]]) -> String {
    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part);
    }
    let digest = hasher.finalize();
    BigInt::from_signed_bytes_be(&digest).to_str_radix(16)
}

/// The login hash sent to the identity verification service.
pub fn server_id_hash(server_id: &str, public_key_der: &[u8], key: &EncryptionKey) -> String {
    signed_hex_digest(&[server_id.as_bytes(), key.as_bytes(), public_key_der])
}

/// Deterministic profile id for an offline-mode player.
pub fn offline_uuid(username: &str) -> Uuid {
    let digest = md5::Md5::new()
        .chain_update(OFFLINE_NAMESPACE)
        .chain_update(username)
        .finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest);
    uuid::Builder::from_md5_bytes(bytes).into_uuid()
}

/// The profile an offline-mode login gets: derived id, username as name.
pub fn offline_profile(username: &str) -> Profile {
    Profile::new(offline_uuid(username), username)
}

//! Shared fixtures: a process key pair, mock verifiers, and a client-side
//! stand-in that encrypts like a real game client.

#![allow(dead_code)]

use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;

use lodestone::prelude::*;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

/// Key generation is slow; every test in a binary shares one pair.
pub static KEYS: LazyLock<Arc<ServerKeyPair>> =
    LazyLock::new(|| Arc::new(ServerKeyPair::generate().expect("key generation")));

// =========================================================================
// Messages
// =========================================================================

pub fn handshake(protocol_version: i32, intent: HandshakeIntent) -> ClientMessage {
    ClientMessage::Handshake {
        protocol_version,
        server_address: "localhost".into(),
        server_port: 25565,
        intent,
    }
}

pub fn login_start(username: &str) -> ClientMessage {
    ClientMessage::LoginStart {
        username: username.into(),
    }
}

/// Encrypts `data` to the server's DER public key, as the client does.
pub fn client_encrypt(public_der: &[u8], data: &[u8]) -> Vec<u8> {
    let public = RsaPublicKey::from_public_key_der(public_der).expect("valid public key");
    public
        .encrypt(&mut rand_core::OsRng, Pkcs1v15Encrypt, data)
        .expect("encrypt")
}

// =========================================================================
// Outbound inspection
// =========================================================================

pub fn drain(rx: &mut UnboundedReceiver<Outbound>) -> Vec<Outbound> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn messages(events: &[Outbound]) -> Vec<ServerMessage> {
    events
        .iter()
        .filter_map(|e| match e {
            Outbound::Message(m) => Some(m.clone()),
            _ => None,
        })
        .collect()
}

pub fn close_reasons(events: &[Outbound]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            Outbound::Close { reason, .. } => Some(reason.clone()),
            _ => None,
        })
        .collect()
}

pub fn disconnect_notices(events: &[Outbound]) -> Vec<String> {
    messages(events)
        .into_iter()
        .filter_map(|m| match m {
            ServerMessage::LoginDisconnect { reason } | ServerMessage::GameDisconnect { reason } => {
                Some(reason)
            }
            _ => None,
        })
        .collect()
}

/// Lets spawned tasks (verification, keep-alive) make progress.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

// =========================================================================
// Mock verifiers
// =========================================================================

/// One recorded verifier call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyCall {
    pub username: String,
    pub server_hash: String,
    pub route: ProxyRoute,
}

pub type Calls = Arc<Mutex<Vec<VerifyCall>>>;

/// Vouches for everyone, optionally after a delay.
#[derive(Clone, Default)]
pub struct AcceptVerifier {
    pub calls: Calls,
    pub delay: Option<Duration>,
}

impl AcceptVerifier {
    pub fn slow(delay: Duration) -> Self {
        Self {
            calls: Calls::default(),
            delay: Some(delay),
        }
    }

    pub fn calls(&self) -> Vec<VerifyCall> {
        self.calls.lock().unwrap().clone()
    }
}

pub fn verified_uuid() -> Uuid {
    Uuid::from_u128(0x0690_9ff9_7b54_4d4f_9a7c_2f2e_3a1b_c0de)
}

impl IdentityVerifier for AcceptVerifier {
    async fn verify(
        &self,
        username: &str,
        server_hash: &str,
        route: &ProxyRoute,
    ) -> Result<Option<Profile>, VerifyError> {
        self.calls.lock().unwrap().push(VerifyCall {
            username: username.to_string(),
            server_hash: server_hash.to_string(),
            route: route.clone(),
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(Some(Profile::new(verified_uuid(), username)))
    }
}

/// Answers, but never vouches.
pub struct RejectVerifier;

impl IdentityVerifier for RejectVerifier {
    async fn verify(&self, _: &str, _: &str, _: &ProxyRoute) -> Result<Option<Profile>, VerifyError> {
        Ok(None)
    }
}

/// Service is down.
pub struct FailingVerifier;

impl IdentityVerifier for FailingVerifier {
    async fn verify(&self, _: &str, _: &str, _: &ProxyRoute) -> Result<Option<Profile>, VerifyError> {
        Err(VerifyError::Status(503))
    }
}

// =========================================================================
// Listeners
// =========================================================================

pub fn offline_listener() -> ServerListener<NoVerifier> {
    ServerListener::builder()
        .key_pair(Arc::clone(&KEYS))
        .build_offline()
        .expect("listener")
}

pub fn verifying_listener<V: IdentityVerifier>(verifier: V) -> ServerListener<V> {
    ServerListener::builder()
        .key_pair(Arc::clone(&KEYS))
        .build(verifier)
        .expect("listener")
}

/// Runs the handshake and login start on a verifying listener and returns
/// the encryption request's verify token.
pub fn start_verified_login<V: IdentityVerifier>(
    handler: &SessionHandler<ChannelSession, V>,
    rx: &mut UnboundedReceiver<Outbound>,
    username: &str,
) -> Vec<u8> {
    handler
        .handle(handshake(lodestone::PROTOCOL_VERSION, HandshakeIntent::Login))
        .expect("handshake");
    handler.handle(login_start(username)).expect("login start");
    match messages(&drain(rx)).as_slice() {
        [ServerMessage::EncryptionRequest { verify_token, .. }] => verify_token.clone(),
        other => panic!("expected one EncryptionRequest, got {other:?}"),
    }
}

/// A correctly encrypted response for `token` and `secret`.
pub fn encryption_response(token: &[u8], secret: &[u8; 16]) -> ClientMessage {
    let der = KEYS.public_key_der();
    ClientMessage::EncryptionResponse {
        shared_secret: client_encrypt(der, secret),
        verify_token: client_encrypt(der, token),
    }
}

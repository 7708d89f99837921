//! Integration tests for the handshake and status phases.

mod common;

use std::sync::Arc;

use common::*;
use lodestone::prelude::*;
use lodestone::{GAME_VERSION, PROTOCOL_VERSION};
use lodestone_protocol::ProtocolError;

fn status_listener() -> ServerListener<NoVerifier> {
    ServerListener::builder()
        .key_pair(Arc::clone(&KEYS))
        .status_provider(|peer: &PeerInfo| {
            assert_eq!(peer.phase, Phase::Status);
            StatusInfo::new(GAME_VERSION, PROTOCOL_VERSION, 20, 3, "A Lodestone server")
        })
        .build_offline()
        .expect("listener")
}

// =========================================================================
// Handshake
// =========================================================================

#[tokio::test]
async fn test_status_intent_enters_status_silently() {
    let (session, mut rx) = ChannelSession::new();
    let handler = status_listener().accept(session);

    handler
        .handle(handshake(PROTOCOL_VERSION, HandshakeIntent::Status))
        .unwrap();

    assert_eq!(handler.phase(), Phase::Status);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_matching_version_enters_login_silently() {
    let (session, mut rx) = ChannelSession::new();
    let handler = offline_listener().accept(session);

    handler
        .handle(handshake(PROTOCOL_VERSION, HandshakeIntent::Login))
        .unwrap();

    assert_eq!(handler.phase(), Phase::Login);
    assert!(drain(&mut rx).is_empty());
    assert!(!handler.is_disconnected());
}

#[tokio::test]
async fn test_newer_client_is_told_server_outdated() {
    let (session, mut rx) = ChannelSession::new();
    let handler = offline_listener().accept(session);

    let err = handler
        .handle(handshake(PROTOCOL_VERSION + 1, HandshakeIntent::Login))
        .unwrap_err();
    assert!(matches!(err, LodestoneError::ServerOutdated { .. }));

    let events = drain(&mut rx);
    assert_eq!(
        messages(&events),
        vec![ServerMessage::LoginDisconnect {
            reason: "server outdated, server is on version 1.8".into()
        }]
    );
    assert_eq!(close_reasons(&events).len(), 1);
    assert!(handler.is_disconnected());
}

#[tokio::test]
async fn test_older_client_is_told_client_outdated() {
    let (session, mut rx) = ChannelSession::new();
    let handler = offline_listener().accept(session);

    let err = handler
        .handle(handshake(PROTOCOL_VERSION - 1, HandshakeIntent::Login))
        .unwrap_err();
    assert!(matches!(err, LodestoneError::ClientOutdated { .. }));
    assert_eq!(
        disconnect_notices(&drain(&mut rx)),
        vec!["client outdated, use version 1.8".to_string()]
    );
}

#[tokio::test]
async fn test_messages_after_version_mismatch_are_dropped() {
    let (session, mut rx) = ChannelSession::new();
    let handler = offline_listener().accept(session);

    let _ = handler.handle(handshake(PROTOCOL_VERSION + 5, HandshakeIntent::Login));
    drain(&mut rx);

    handler.handle(login_start("Alice")).unwrap();
    assert!(drain(&mut rx).is_empty());
    assert_eq!(handler.phase(), Phase::Login);
    assert!(handler.profile().is_none());
}

#[tokio::test]
async fn test_unknown_intent_is_rejected() {
    let (session, mut rx) = ChannelSession::new();
    let handler = offline_listener().accept(session);

    let err = handler
        .handle(handshake(PROTOCOL_VERSION, HandshakeIntent::Unknown(3)))
        .unwrap_err();
    assert!(matches!(
        err,
        LodestoneError::Protocol(ProtocolError::InvalidIntent(3))
    ));

    // Handshake has no disconnect message: the socket just closes.
    let events = drain(&mut rx);
    assert!(messages(&events).is_empty());
    assert_eq!(close_reasons(&events).len(), 1);
    assert_eq!(handler.phase(), Phase::Handshake);
}

#[tokio::test]
async fn test_non_handshake_first_message_is_a_violation() {
    let (session, mut rx) = ChannelSession::new();
    let handler = offline_listener().accept(session);

    let err = handler.handle(login_start("Alice")).unwrap_err();
    assert!(matches!(
        err,
        LodestoneError::Protocol(ProtocolError::UnexpectedMessage {
            phase: Phase::Handshake,
            message: "LoginStart",
        })
    ));
    assert!(messages(&drain(&mut rx)).is_empty());
}

// =========================================================================
// Status
// =========================================================================

#[tokio::test]
async fn test_status_query_answers_with_provider_info() {
    let (session, mut rx) = ChannelSession::new();
    let handler = status_listener().accept(session);

    handler
        .handle(handshake(PROTOCOL_VERSION, HandshakeIntent::Status))
        .unwrap();
    handler.handle(ClientMessage::StatusQuery).unwrap();

    match messages(&drain(&mut rx)).as_slice() {
        [ServerMessage::StatusResponse { info }] => {
            assert_eq!(info.version.protocol, PROTOCOL_VERSION);
            assert_eq!(info.players.online, 3);
            assert_eq!(info.description, "A Lodestone server");
        }
        other => panic!("expected StatusResponse, got {other:?}"),
    }
}

#[tokio::test]
async fn test_status_query_without_provider_fails() {
    let (session, mut rx) = ChannelSession::new();
    let handler = offline_listener().accept(session);

    handler
        .handle(handshake(PROTOCOL_VERSION, HandshakeIntent::Status))
        .unwrap();
    let err = handler.handle(ClientMessage::StatusQuery).unwrap_err();
    assert!(matches!(err, LodestoneError::MissingStatusProvider));

    let events = drain(&mut rx);
    assert!(messages(&events).is_empty());
    assert_eq!(close_reasons(&events), vec!["no server info builder set".to_string()]);
}

#[tokio::test]
async fn test_status_ping_echoes_payload() {
    let (session, mut rx) = ChannelSession::new();
    let handler = status_listener().accept(session);

    handler
        .handle(handshake(PROTOCOL_VERSION, HandshakeIntent::Status))
        .unwrap();
    handler
        .handle(ClientMessage::StatusPing {
            payload: 0x1234_5678_9abc,
        })
        .unwrap();

    assert_eq!(
        messages(&drain(&mut rx)),
        vec![ServerMessage::StatusPong {
            payload: 0x1234_5678_9abc
        }]
    );
}

#[tokio::test]
async fn test_status_phase_never_goes_back_to_handshake() {
    let (session, _rx) = ChannelSession::new();
    let handler = status_listener().accept(session);

    handler
        .handle(handshake(PROTOCOL_VERSION, HandshakeIntent::Status))
        .unwrap();
    assert!(
        handler
            .handle(handshake(PROTOCOL_VERSION, HandshakeIntent::Login))
            .is_err()
    );
    assert_eq!(handler.phase(), Phase::Status);
}

#[tokio::test]
async fn test_login_start_during_status_is_a_violation() {
    let (session, _rx) = ChannelSession::new();
    let handler = status_listener().accept(session);

    handler
        .handle(handshake(PROTOCOL_VERSION, HandshakeIntent::Status))
        .unwrap();
    let err = handler.handle(login_start("Alice")).unwrap_err();
    assert!(err.is_security_relevant());
    assert_ne!(handler.phase(), Phase::Game);
}

#[tokio::test]
async fn test_disconnect_in_status_sends_no_notice() {
    let (session, mut rx) = ChannelSession::new();
    let handler = status_listener().accept(session);

    handler
        .handle(handshake(PROTOCOL_VERSION, HandshakeIntent::Status))
        .unwrap();
    handler.disconnect("bye", None);
    handler.disconnect("bye again", None);

    let events = drain(&mut rx);
    assert!(disconnect_notices(&events).is_empty());
    assert_eq!(close_reasons(&events), vec!["bye".to_string()]);
}

//! Integration tests for the game phase: keep-alive, latency, teardown.
//!
//! Uses `start_paused = true` so keep-alive intervals resolve instantly.

mod common;

use std::time::Duration;

use common::*;
use lodestone::prelude::*;
use lodestone::PROTOCOL_VERSION;
use tokio::sync::mpsc;
use tokio::sync::mpsc::UnboundedReceiver;

type Handler = SessionHandler<ChannelSession, NoVerifier>;

/// Logs "Alice" in offline and discards the login traffic.
fn logged_in() -> (Handler, UnboundedReceiver<Outbound>) {
    let (session, mut rx) = ChannelSession::new();
    let handler = offline_listener().accept(session);
    handler
        .handle(handshake(PROTOCOL_VERSION, HandshakeIntent::Login))
        .unwrap();
    handler.handle(login_start("Alice")).unwrap();
    drain(&mut rx);
    (handler, rx)
}

fn probe_ids(events: &[Outbound]) -> Vec<i32> {
    messages(events)
        .into_iter()
        .filter_map(|m| match m {
            ServerMessage::KeepAliveRequest { id } => Some(id),
            _ => None,
        })
        .collect()
}

// =========================================================================
// Keep-alive
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_keep_alive_starts_after_login() {
    let (handler, mut rx) = logged_in();
    settle().await;

    assert_eq!(probe_ids(&drain(&mut rx)).len(), 1);
    assert_eq!(handler.keep_alive_probes(), Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_no_keep_alive_before_game() {
    let (session, mut rx) = ChannelSession::new();
    let handler = offline_listener().accept(session);
    handler
        .handle(handshake(PROTOCOL_VERSION, HandshakeIntent::Login))
        .unwrap();

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(probe_ids(&drain(&mut rx)).is_empty());
    assert_eq!(handler.keep_alive_probes(), None);
}

#[tokio::test(start_paused = true)]
async fn test_keep_alive_count_over_n_seconds() {
    let (_handler, mut rx) = logged_in();

    let n_secs = 9;
    tokio::time::sleep(Duration::from_secs(n_secs)).await;

    let sent = probe_ids(&drain(&mut rx)).len() as u64;
    assert!(sent >= n_secs / 2 && sent <= n_secs / 2 + 1, "got {sent} probes");
}

#[tokio::test(start_paused = true)]
async fn test_matching_reply_sets_latency() {
    let (handler, mut rx) = logged_in();
    settle().await;
    let id = probe_ids(&drain(&mut rx))[0];

    tokio::time::advance(Duration::from_millis(30)).await;
    handler.handle(ClientMessage::KeepAliveReply { id }).unwrap();

    assert_eq!(handler.latency(), Duration::from_millis(30));
    assert_eq!(handler.peer_info().latency, Duration::from_millis(30));
}

#[tokio::test(start_paused = true)]
async fn test_stale_reply_leaves_latency_unchanged() {
    let (handler, mut rx) = logged_in();
    settle().await;
    let id = probe_ids(&drain(&mut rx))[0];

    handler
        .handle(ClientMessage::KeepAliveReply {
            id: id.wrapping_add(7),
        })
        .unwrap();

    assert_eq!(handler.latency(), Duration::ZERO);
    assert!(!handler.is_disconnected());
}

#[tokio::test(start_paused = true)]
async fn test_other_game_messages_are_ignored() {
    let (handler, mut rx) = logged_in();
    settle().await;
    drain(&mut rx);

    handler
        .handle(ClientMessage::Game {
            packet_id: 0x01,
            data: vec![1, 2, 3],
        })
        .unwrap();
    handler.handle(login_start("Alice")).unwrap();

    assert!(drain(&mut rx).is_empty());
    assert_eq!(handler.phase(), Phase::Game);
}

// =========================================================================
// Teardown
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_game_disconnect_is_sent_once() {
    let (handler, mut rx) = logged_in();
    settle().await;
    drain(&mut rx);

    handler.disconnect("kicked", None);
    handler.disconnect("kicked twice", None);

    let events = drain(&mut rx);
    assert_eq!(
        events,
        vec![
            Outbound::Message(ServerMessage::GameDisconnect {
                reason: "kicked".into()
            }),
            Outbound::Close {
                reason: "kicked".into(),
                cause: None,
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_stops_keep_alive() {
    let (handler, mut rx) = logged_in();
    settle().await;

    handler.disconnect("bye", None);
    drain(&mut rx);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(drain(&mut rx).is_empty());
    assert_eq!(handler.keep_alive_probes(), None);
}

#[tokio::test(start_paused = true)]
async fn test_peer_close_sends_nothing() {
    let (handler, mut rx) = logged_in();
    settle().await;
    drain(&mut rx);

    handler.session().mark_closed();
    handler.closed();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert!(drain(&mut rx).is_empty());
    assert!(handler.is_disconnected());
}

#[tokio::test(start_paused = true)]
async fn test_run_loop_drives_login_and_ends_on_close() {
    let (session, mut rx) = ChannelSession::new();
    let handler = offline_listener().accept(session);
    let (tx, inbound) = mpsc::channel(8);
    let task = tokio::spawn(handler.clone().run(inbound));

    tx.send(handshake(PROTOCOL_VERSION, HandshakeIntent::Login))
        .await
        .unwrap();
    tx.send(login_start("Alice")).await.unwrap();
    settle().await;
    assert_eq!(handler.phase(), Phase::Game);

    drop(tx);
    task.await.unwrap();
    assert!(handler.is_disconnected());

    let events = drain(&mut rx);
    assert!(disconnect_notices(&events).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_run_loop_stops_after_violation() {
    let (session, mut rx) = ChannelSession::new();
    let handler = offline_listener().accept(session);
    let (tx, inbound) = mpsc::channel(8);
    let task = tokio::spawn(handler.clone().run(inbound));

    tx.send(ClientMessage::StatusQuery).await.unwrap();
    task.await.unwrap();

    assert!(handler.is_disconnected());
    assert_eq!(close_reasons(&drain(&mut rx)).len(), 1);
}

use std::time::Duration;

use lodestone::prelude::*;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Stands in for the socket writer: prints every event it would write.
async fn print_outbound(conn: ConnectionId, mut rx: mpsc::UnboundedReceiver<Outbound>) {
    while let Some(event) = rx.recv().await {
        match event {
            Outbound::Message(ServerMessage::StatusResponse { info }) => {
                let json = info.to_json().unwrap_or_else(|e| e.to_string());
                println!("[{conn}] -> StatusResponse {json}");
            }
            Outbound::Message(msg) => println!("[{conn}] -> {msg:?}"),
            Outbound::EnableEncryption(_) => println!("[{conn}] == cipher on"),
            Outbound::SetCompression(t) => println!("[{conn}] == compression threshold {t}"),
            Outbound::Close { reason, .. } => {
                println!("[{conn}] -- closed: {reason}");
                break;
            }
        }
    }
}

fn handshake(intent: HandshakeIntent) -> ClientMessage {
    ClientMessage::Handshake {
        protocol_version: lodestone::PROTOCOL_VERSION,
        server_address: "localhost".into(),
        server_port: 25565,
        intent,
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    lodestone::logging::init("info,lodestone=debug")?;

    let listener = ServerListener::builder()
        .keep_alive_interval(Duration::from_millis(500))
        .status_provider(|_: &PeerInfo| {
            StatusInfo::new(lodestone::GAME_VERSION, lodestone::PROTOCOL_VERSION, 20, 1, "Lodestone demo")
        })
        .login_handler(|peer: &PeerInfo| {
            tracing::info!(conn_id = %peer.conn_id, username = ?peer.username, "welcome");
        })
        .build_offline()?;

    // A server-list ping.
    let (session, rx) = ChannelSession::new();
    let writer = tokio::spawn(print_outbound(session.id(), rx));
    let pinger = listener.accept(session);
    pinger.handle(handshake(HandshakeIntent::Status))?;
    pinger.handle(ClientMessage::StatusQuery)?;
    pinger.handle(ClientMessage::StatusPing { payload: 42 })?;
    pinger.disconnect("ping done", None);
    writer.await?;

    // An offline login that stays for a few keep-alives.
    let (session, rx) = ChannelSession::new();
    let writer = tokio::spawn(print_outbound(session.id(), rx));
    let player = listener.accept(session);
    player.handle(handshake(HandshakeIntent::Login))?;
    player.handle(ClientMessage::LoginStart {
        username: "Alice".into(),
    })?;

    for _ in 0..3 {
        tokio::time::sleep(Duration::from_millis(500)).await;
        let id = player.state().lock().ping.last_id();
        tokio::time::sleep(Duration::from_millis(5)).await;
        player.handle(ClientMessage::KeepAliveReply { id })?;
        println!("latency: {:?}", player.latency());
    }

    player.disconnect("demo over", None);
    writer.await?;
    Ok(())
}

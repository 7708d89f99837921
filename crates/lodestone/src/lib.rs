//! # Lodestone
//!
//! Server-side session handler for a multi-phase game connection protocol.
//!
//! Each accepted connection moves through Handshake, then Status or Login,
//! then Game. Lodestone handles the protocol version check, server-list
//! status, RSA key exchange and identity verification, compression
//! negotiation, and the keep-alive that measures latency once a player is
//! in the game. The socket and wire codec stay with the transport, behind
//! the [`Session`](lodestone_transport::Session) trait.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lodestone::prelude::*;
//!
//! # async fn demo() -> Result<(), LodestoneError> {
//! let listener = ServerListener::builder()
//!     .status_provider(|_: &PeerInfo| StatusInfo::new("1.8", 47, 20, 0, "A Lodestone server"))
//!     .build_offline()?;
//!
//! let (session, _outbound) = ChannelSession::new();
//! let handler = listener.accept(session);
//! handler.handle(ClientMessage::Handshake {
//!     protocol_version: 47,
//!     server_address: "localhost".into(),
//!     server_port: 25565,
//!     intent: HandshakeIntent::Login,
//! })?;
//! handler.handle(ClientMessage::LoginStart { username: "Alice".into() })?;
//! assert_eq!(handler.phase(), Phase::Game);
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod handler;
mod hooks;
mod login;
pub mod logging;
mod server;

pub use config::{DEFAULT_VERIFY_TIMEOUT, GAME_VERSION, PROTOCOL_VERSION, ServerConfig};
pub use error::LodestoneError;
pub use handler::SessionHandler;
pub use hooks::{LoginHandler, NoVerifier, PeerInfo, StatusProvider};
pub use server::{ServerListener, ServerListenerBuilder};

/// Convenient re-exports for server code.
pub mod prelude {
    pub use crate::{
        LodestoneError, LoginHandler, NoVerifier, PeerInfo, ServerConfig, ServerListener,
        SessionHandler, StatusProvider,
    };
    pub use lodestone_keepalive::KeepAliveConfig;
    pub use lodestone_protocol::{
        ClientMessage, HandshakeIntent, Phase, Profile, ServerMessage, StatusInfo,
    };
    pub use lodestone_session::{IdentityVerifier, ProxyRoute, ServerKeyPair, VerifyError};
    pub use lodestone_transport::{ChannelSession, ConnectionId, Outbound, Session};
}

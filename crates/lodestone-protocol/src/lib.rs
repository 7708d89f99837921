//! Protocol vocabulary for Lodestone.
//!
//! This crate defines what the client and server say to each other during
//! a login, independent of how it is framed on the wire:
//!
//! - **Phases** ([`Phase`]): the four stages of a connection.
//! - **Messages** ([`ClientMessage`], [`ServerMessage`]): one enum per
//!   direction covering every phase.
//! - **Identity** ([`Profile`]) and the server-list payload ([`StatusInfo`]).
//! - **Errors** ([`ProtocolError`]): protocol violations.
//!
//! # Architecture
//!
//! ```text
//! Codec (bytes) → Protocol (ClientMessage) → Session handler (phase machine)
//! ```

mod error;
mod status;
mod types;

pub use error::ProtocolError;
pub use status::{PlayerInfo, StatusInfo, VersionInfo};
pub use types::{ClientMessage, HandshakeIntent, Phase, Profile, ServerMessage};

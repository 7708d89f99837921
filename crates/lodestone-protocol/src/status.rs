//! Server-list status payload.
//!
//! The game treats this as opaque JSON. We model the handful of fields
//! every client reads so [`StatusProvider`] implementations get type
//! checking, and keep the rest of the document out of scope.
//!
//! [`StatusProvider`]: https://docs.rs/lodestone/latest/lodestone/trait.StatusProvider.html

use serde::{Deserialize, Serialize};

/// Version block of the status response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Human-readable version, e.g. `"1.8"`.
    pub name: String,
    /// Numeric protocol version the server speaks.
    pub protocol: i32,
}

/// Player counts shown in the server list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub max: u32,
    pub online: u32,
}

/// The status response payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusInfo {
    pub version: VersionInfo,
    pub players: PlayerInfo,
    /// Message of the day.
    pub description: String,
    /// Base64 PNG data URI, if the server has an icon.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub favicon: Option<String>,
}

impl StatusInfo {
    /// Creates a status payload with no favicon.
    pub fn new(
        version_name: impl Into<String>,
        protocol: i32,
        max_players: u32,
        online_players: u32,
        description: impl Into<String>,
    ) -> Self {
        Self {
            version: VersionInfo {
                name: version_name.into(),
                protocol,
            },
            players: PlayerInfo {
                max: max_players,
                online: online_players,
            },
            description: description.into(),
            favicon: None,
        }
    }

    /// Renders the JSON document carried by the status response packet.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`](crate::ProtocolError::Encode) if
    /// serialization fails.
    #[cfg(feature = "json")]
    pub fn to_json(&self) -> Result<String, crate::ProtocolError> {
        serde_json::to_string(self).map_err(crate::ProtocolError::Encode)
    }
}

//! Connection state for the media channel.

use serde::{Deserialize, Serialize};

/// Transport-level connection state of the channel client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Not connected.
    #[default]
    Disconnected,

    /// Connecting to the channel.
    Connecting,

    /// Connected and able to publish.
    Connected,

    /// Transport dropped; the client is attempting to come back.
    Reconnecting,

    /// Connection failed permanently.
    Failed { reason: String },
}

impl ConnectionState {
    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if fully disconnected (failed counts).
    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed { .. })
    }

    /// Check if in a transient state (connecting or reconnecting).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connecting | Self::Reconnecting)
    }

    /// Get status message for UI.
    pub fn message(&self) -> String {
        match self {
            Self::Disconnected => "Disconnected".to_string(),
            Self::Connecting => "Connecting...".to_string(),
            Self::Connected => "Connected".to_string(),
            Self::Reconnecting => "Reconnecting...".to_string(),
            Self::Failed { reason } => format!("Failed: {}", reason),
        }
    }
}

//! Session phase machine types.

use serde::{Deserialize, Serialize};

/// The current phase of a broadcast session.
///
/// Phases advance in order for a successful broadcast; `Error` is
/// reachable from any non-terminal phase. The session controller is the
/// single writer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    /// No devices acquired, nothing in flight.
    #[default]
    Idle,

    /// Device acquisition in progress.
    DeviceAcquiring,

    /// Local tracks acquired, preview available, not yet live.
    DeviceReady,

    /// Time gate passed, requesting a channel credential.
    Authorizing,

    /// Credential obtained, channel join in progress.
    Joining,

    /// Tracks published, broadcast in progress.
    Live,

    /// Unpublish and channel leave in progress.
    Ending,

    /// Broadcast over; devices may remain warm for a restart.
    Ended,

    /// A fatal failure stopped the session.
    Error,
}

impl SessionPhase {
    /// Returns true if the session is idle.
    pub fn is_idle(self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Returns true if local tracks are held (ready or beyond).
    pub fn has_devices(self) -> bool {
        matches!(
            self,
            Self::DeviceReady | Self::Authorizing | Self::Joining | Self::Live | Self::Ending
        )
    }

    /// Returns true if the broadcast is live.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Live)
    }

    /// Returns true while an asynchronous transition is in flight.
    pub fn is_transitioning(self) -> bool {
        matches!(
            self,
            Self::DeviceAcquiring | Self::Authorizing | Self::Joining | Self::Ending
        )
    }

    /// Returns true once the current attempt is over. A new attempt can
    /// still start from either terminal phase via a camera restart.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ended | Self::Error)
    }

    /// Returns a simple string representation of the phase.
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::DeviceAcquiring => "DeviceAcquiring",
            Self::DeviceReady => "DeviceReady",
            Self::Authorizing => "Authorizing",
            Self::Joining => "Joining",
            Self::Live => "Live",
            Self::Ending => "Ending",
            Self::Ended => "Ended",
            Self::Error => "Error",
        }
    }
}

/// Reason a broadcast ended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EndReason {
    /// Broadcaster requested the end.
    UserRequested,

    /// The transport failed fatally.
    TransportFailure { message: String },

    /// The controller was discarded while the session was active.
    Discarded,
}

impl EndReason {
    /// Returns a display message for this reason.
    pub fn message(&self) -> String {
        match self {
            Self::UserRequested => "Broadcast ended by the broadcaster".to_string(),
            Self::TransportFailure { message } => format!("Transport failure: {message}"),
            Self::Discarded => "Broadcast controller discarded".to_string(),
        }
    }
}

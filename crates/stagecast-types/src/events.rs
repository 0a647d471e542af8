//! Events sent from the session controller to the UI.

use serde::{Deserialize, Serialize};

use crate::phase::SessionPhase;
use crate::types::{DeviceDescriptor, ErrorRecord, SessionSnapshot};

/// Events that the session controller can send to the UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionEvent {
    /// Session phase has changed.
    PhaseChanged {
        /// Previous phase.
        previous: SessionPhase,

        /// Current phase.
        current: SessionPhase,
    },

    /// Snapshot of the current session state.
    Snapshot(SessionSnapshot),

    /// List of available capture devices.
    Devices(Vec<DeviceDescriptor>),

    /// Live viewer count changed.
    ViewerCount(u32),

    /// Go-live was requested before the gate opens.
    TimeGateClosed {
        /// Whole minutes remaining until the gate opens.
        wait_minutes: u64,

        /// Remaining seconds after the whole minutes.
        wait_seconds: u64,
    },

    /// The transport dropped while live; the session stays live and the
    /// broadcaster decides whether to wait or end.
    TransportLost { message: String },

    /// The transport recovered after a drop.
    TransportRecovered,

    /// A fatal failure was recorded.
    Error(ErrorRecord),

    /// Controller is ready to accept commands.
    Ready,

    /// Controller has shut down.
    Shutdown,
}

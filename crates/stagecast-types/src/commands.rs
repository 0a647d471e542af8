//! Commands sent from the UI to the session controller.

use serde::{Deserialize, Serialize};

use crate::types::DeviceSelection;

/// Commands that the UI can send to the session controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionCommand {
    /// Acquire camera and microphone and bind the local preview.
    StartCamera { selection: DeviceSelection },

    /// Evaluate the time gate and, if open, authorize and join the channel.
    GoLive,

    /// End the live broadcast (unpublish, leave the channel).
    EndBroadcast,

    /// Mute or unmute the microphone without releasing the device.
    SetMicEnabled(bool),

    /// Enable or disable the camera track without releasing the device.
    SetCameraEnabled(bool),

    /// Re-acquire video from a different camera.
    SwitchCamera { camera_id: String },

    /// Request the list of available capture devices.
    ListDevices,

    /// Request a snapshot of the current session state.
    GetSnapshot,

    /// Release local tracks kept warm after an ended broadcast.
    ReleaseDevices,

    /// Shut the controller down completely.
    Shutdown,
}

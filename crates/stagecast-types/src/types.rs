//! Common types used across session messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Configuration for one broadcast session, constructed explicitly by the
/// embedder and passed to the controller at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Identifier of the ticketed event being broadcast.
    pub event_id: String,

    /// Scheduled event start time.
    pub event_start_time: DateTime<Utc>,

    /// Seconds before the scheduled start at which going live is allowed.
    pub early_entry_seconds: u64,

    /// Credential time-to-live requested from the token issuer. The
    /// issuer clamps this server-side; the returned expiry is ground
    /// truth.
    pub credential_ttl_seconds: u64,

    /// Video capture constraints for the camera track.
    pub video: VideoConstraints,
}

impl BroadcastConfig {
    /// Channel id for this event, stable for the session's lifetime.
    pub fn channel_id(&self) -> String {
        format!("event-{}", self.event_id)
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            event_id: String::new(),
            event_start_time: Utc::now(),
            early_entry_seconds: 300,
            credential_ttl_seconds: 3600,
            video: VideoConstraints::default(),
        }
    }
}

/// Capture constraints for the camera track.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VideoConstraints {
    /// Width in pixels.
    pub width: u32,

    /// Height in pixels.
    pub height: u32,

    /// Target frame rate.
    pub framerate: u32,
}

impl Default for VideoConstraints {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            framerate: 30,
        }
    }
}

/// A capture device (camera or microphone).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Unique identifier for this device.
    pub id: String,

    /// Display name for the UI.
    pub label: String,

    /// Type of capture device.
    pub kind: DeviceKind,

    /// Whether this is the platform default device of its kind.
    pub is_default: bool,
}

/// Type of capture device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceKind {
    /// Video input (camera).
    Camera,

    /// Audio input (microphone).
    Microphone,
}

/// Devices chosen before acquisition. Empty fields fall back to the
/// platform default of that kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceSelection {
    /// Chosen microphone device id.
    pub microphone_id: Option<String>,

    /// Chosen camera device id.
    pub camera_id: Option<String>,
}

/// Classification of a session failure, mirroring the failure surface of
/// the media, channel, and sink layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionErrorKind {
    /// Browser/platform denied access to capture devices.
    DevicePermissionDenied,

    /// No capture hardware exists.
    DeviceUnavailable,

    /// Device acquisition failed for another reason.
    AcquisitionFailed,

    /// Credential request failed at the transport level.
    CredentialRequestFailed,

    /// The token issuer rejected the request.
    CredentialDenied,

    /// Channel join failed.
    ChannelJoinFailed,

    /// Transport dropped while live (non-fatal).
    ChannelTransportLost,

    /// Stream-status sink could not be reached (non-fatal, logged only).
    StatusSinkUnreachable,
}

/// The last user-facing failure. Replaced, not queued, by the next
/// failure; cleared on the next successful transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Failure classification.
    pub kind: SessionErrorKind,

    /// Human-readable message.
    pub message: String,

    /// When the failure was recorded.
    pub at_epoch_millis: i64,
}

impl ErrorRecord {
    /// Record a failure happening now.
    pub fn new(kind: SessionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            at_epoch_millis: Utc::now().timestamp_millis(),
        }
    }
}

/// Observable snapshot of a broadcast session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Channel id derived from the event id.
    pub channel_id: String,

    /// Current phase.
    pub phase: crate::phase::SessionPhase,

    /// Participant uid of the local broadcaster, present from the join
    /// attempt onwards.
    pub participant_uid: Option<u32>,

    /// Current live viewer count.
    pub viewer_count: u32,

    /// Epoch milliseconds at which the session went live.
    pub started_at_epoch_millis: Option<i64>,

    /// Last user-facing failure, if any.
    pub last_error: Option<ErrorRecord>,
}

impl SessionSnapshot {
    /// Elapsed live duration in milliseconds, if the session is or was
    /// live since `started_at_epoch_millis` was set.
    pub fn elapsed_millis(&self, now_epoch_millis: i64) -> Option<i64> {
        self.started_at_epoch_millis
            .map(|started| (now_epoch_millis - started).max(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_id_derivation() {
        let config = BroadcastConfig {
            event_id: "evt-1".to_string(),
            ..Default::default()
        };
        assert_eq!(config.channel_id(), "event-evt-1");
    }

    #[test]
    fn test_elapsed_millis() {
        let snapshot = SessionSnapshot {
            channel_id: "event-evt-1".to_string(),
            phase: crate::phase::SessionPhase::Live,
            participant_uid: Some(42),
            viewer_count: 0,
            started_at_epoch_millis: Some(1_000),
            last_error: None,
        };
        assert_eq!(snapshot.elapsed_millis(4_500), Some(3_500));
        // A clock step backwards never yields a negative duration.
        assert_eq!(snapshot.elapsed_millis(500), Some(0));
    }

    #[test]
    fn test_snapshot_serializes() {
        let snapshot = SessionSnapshot {
            channel_id: "event-evt-1".to_string(),
            phase: crate::phase::SessionPhase::Idle,
            participant_uid: None,
            viewer_count: 0,
            started_at_epoch_millis: None,
            last_error: Some(ErrorRecord::new(
                SessionErrorKind::AcquisitionFailed,
                "camera in use",
            )),
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: SessionSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.phase, crate::phase::SessionPhase::Idle);
        assert_eq!(
            back.last_error.unwrap().kind,
            SessionErrorKind::AcquisitionFailed
        );
    }
}

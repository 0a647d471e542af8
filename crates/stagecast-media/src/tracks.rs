//! Opaque track capability handles.

use std::sync::Arc;

/// A local capture track, independent of the underlying media transport
/// library.
///
/// Implementations must make `close` idempotent; after the first call
/// `is_ready` returns false and `set_enabled` is a no-op.
pub trait MediaTrack: Send + Sync {
    /// Mute or unmute the track without releasing the underlying device.
    fn set_enabled(&self, enabled: bool);

    /// Stop the track and release the underlying device.
    fn close(&self);

    /// Returns true while the track holds a live device.
    fn is_ready(&self) -> bool;
}

/// Shared handle to a track.
pub type TrackHandle = Arc<dyn MediaTrack>;

/// The audio and video tracks acquired together for one session.
#[derive(Clone)]
pub struct TrackPair {
    /// Microphone track.
    pub audio: TrackHandle,

    /// Camera track.
    pub video: TrackHandle,
}

impl TrackPair {
    /// Create a pair from freshly acquired tracks.
    pub fn new(audio: TrackHandle, video: TrackHandle) -> Self {
        Self { audio, video }
    }

    /// Stop and release both tracks.
    pub fn close(&self) {
        self.audio.close();
        self.video.close();
    }

    /// Returns true while both tracks hold live devices.
    pub fn is_ready(&self) -> bool {
        self.audio.is_ready() && self.video.is_ready()
    }
}

impl std::fmt::Debug for TrackPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackPair")
            .field("audio_ready", &self.audio.is_ready())
            .field("video_ready", &self.video.is_ready())
            .finish()
    }
}

//! Device acquisition guard and release guarantees.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use stagecast_types::{DeviceDescriptor, DeviceKind, DeviceSelection, VideoConstraints};

use crate::backend::MediaBackend;
use crate::tracks::TrackPair;
use crate::{MediaError, MediaResult};

/// Enumerated capture devices, split by kind.
#[derive(Debug, Clone, Default)]
pub struct DeviceList {
    /// Available cameras.
    pub cameras: Vec<DeviceDescriptor>,

    /// Available microphones.
    pub microphones: Vec<DeviceDescriptor>,
}

struct HeldDevices {
    tracks: Option<TrackPair>,
    selection: DeviceSelection,
}

/// Owns the hardware lock for one session's camera and microphone.
///
/// Exactly one `DeviceManager` exists per session controller; the
/// acquire guard makes a second acquisition while one is in flight or
/// satisfied a no-op returning the existing handle, and `release` is
/// idempotent and invoked on drop.
pub struct DeviceManager<B: MediaBackend> {
    backend: Arc<B>,
    held: Mutex<HeldDevices>,
}

impl<B: MediaBackend> DeviceManager<B> {
    /// Create a manager over the given platform backend.
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            held: Mutex::new(HeldDevices {
                tracks: None,
                selection: DeviceSelection::default(),
            }),
        }
    }

    /// Enumerate cameras and microphones.
    ///
    /// If no tracks are held, a throwaway capture grant is obtained and
    /// immediately released first so device labels are populated.
    #[instrument(name = "list_devices", skip(self))]
    pub async fn list_devices(&self) -> MediaResult<DeviceList> {
        {
            let held = self.held.lock().await;
            if held.tracks.is_none() {
                let probe = self
                    .backend
                    .acquire(&DeviceSelection::default(), VideoConstraints::default())
                    .await?;
                probe.close();
            }
        }

        let devices = self.backend.enumerate().await?;
        if devices.is_empty() {
            return Err(MediaError::NoDevices);
        }

        let mut list = DeviceList::default();
        for device in devices {
            match device.kind {
                DeviceKind::Camera => list.cameras.push(device),
                DeviceKind::Microphone => list.microphones.push(device),
            }
        }

        debug!(
            cameras = list.cameras.len(),
            microphones = list.microphones.len(),
            "Enumerated capture devices"
        );
        Ok(list)
    }

    /// Acquire the microphone and camera tracks.
    ///
    /// Idempotent: while an acquisition is in flight the caller waits on
    /// it, and a satisfied acquisition returns the held pair without a
    /// second hardware lock.
    #[instrument(name = "acquire_devices", skip(self))]
    pub async fn acquire(
        &self,
        selection: DeviceSelection,
        video: VideoConstraints,
    ) -> MediaResult<TrackPair> {
        let mut held = self.held.lock().await;

        if let Some(pair) = held.tracks.as_ref() {
            debug!("Devices already held, returning existing tracks");
            return Ok(pair.clone());
        }

        let pair = self.backend.acquire(&selection, video).await?;
        held.selection = selection;
        held.tracks = Some(pair.clone());

        info!("Capture devices acquired");
        Ok(pair)
    }

    /// Re-acquire with a different camera, through the same guard.
    ///
    /// The held pair is released first; the microphone selection is
    /// carried over.
    #[instrument(name = "switch_camera", skip(self))]
    pub async fn switch_camera(
        &self,
        camera_id: String,
        video: VideoConstraints,
    ) -> MediaResult<TrackPair> {
        let mut held = self.held.lock().await;

        if let Some(pair) = held.tracks.take() {
            pair.close();
        }

        let selection = DeviceSelection {
            microphone_id: held.selection.microphone_id.clone(),
            camera_id: Some(camera_id),
        };

        let pair = self.backend.acquire(&selection, video).await?;
        held.selection = selection;
        held.tracks = Some(pair.clone());

        info!("Camera switched");
        Ok(pair)
    }

    /// Mute or unmute the microphone without releasing the hardware lock.
    pub async fn set_audio_enabled(&self, enabled: bool) {
        if let Some(pair) = self.held.lock().await.tracks.as_ref() {
            pair.audio.set_enabled(enabled);
        }
    }

    /// Enable or disable the camera without releasing the hardware lock.
    pub async fn set_video_enabled(&self, enabled: bool) {
        if let Some(pair) = self.held.lock().await.tracks.as_ref() {
            pair.video.set_enabled(enabled);
        }
    }

    /// The currently held tracks, if any.
    pub async fn tracks(&self) -> Option<TrackPair> {
        self.held.lock().await.tracks.clone()
    }

    /// Stop and release both tracks. Safe to call any number of times.
    #[instrument(name = "release_devices", skip(self))]
    pub async fn release(&self) {
        let mut held = self.held.lock().await;
        if let Some(pair) = held.tracks.take() {
            pair.close();
            info!("Capture devices released");
        }
    }
}

impl<B: MediaBackend> Drop for DeviceManager<B> {
    fn drop(&mut self) {
        // Transitions run to completion on one task, so no acquisition
        // can still hold the lock here; if one somehow does, its result
        // is unreachable and the tracks close with the backend.
        if let Ok(mut held) = self.held.try_lock() {
            if let Some(pair) = held.tracks.take() {
                pair.close();
                warn!("Capture devices released on drop");
            }
        }
    }
}

//! Capture device acquisition and track lifecycle.
//!
//! This crate owns the camera/microphone hardware lock for one broadcast
//! session. The [`DeviceManager`] guards acquisition so a session can
//! never hold two locks on the same hardware, and guarantees release on
//! every teardown path.

mod backend;
mod error;
mod manager;
mod tracks;

pub use backend::MediaBackend;
pub use error::MediaError;
pub use manager::{DeviceList, DeviceManager};
pub use tracks::{MediaTrack, TrackHandle, TrackPair};

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

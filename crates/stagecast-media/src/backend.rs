//! Platform media layer seam.

use async_trait::async_trait;

use stagecast_types::{DeviceDescriptor, DeviceSelection, VideoConstraints};

use crate::tracks::TrackPair;
use crate::MediaResult;

/// The platform media layer: enumeration and acquisition.
///
/// Implementations wrap whatever capture API the host provides. The
/// [`DeviceManager`](crate::DeviceManager) layers the acquire guard and
/// release guarantees on top; backends only need to map platform errors
/// onto [`MediaError`](crate::MediaError), distinguishing permission
/// denials so the UI can show an actionable message.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Enumerate capture devices. Labels may be empty until a capture
    /// grant has been obtained at least once.
    async fn enumerate(&self) -> MediaResult<Vec<DeviceDescriptor>>;

    /// Acquire one microphone track and one camera track. Empty
    /// selection fields fall back to the platform default device of
    /// that kind.
    async fn acquire(
        &self,
        selection: &DeviceSelection,
        video: VideoConstraints,
    ) -> MediaResult<TrackPair>;
}

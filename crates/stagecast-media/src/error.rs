//! Error types for the media module.

use thiserror::Error;

/// Errors that can occur during device operations.
#[derive(Debug, Clone, Error)]
pub enum MediaError {
    /// The platform denied access to capture devices.
    #[error("Capture permission denied")]
    PermissionDenied,

    /// No capture hardware of the requested kind exists.
    #[error("No capture devices available")]
    NoDevices,

    /// Acquisition failed for a reason other than permissions.
    #[error("Device acquisition failed: {0}")]
    AcquisitionFailed(String),
}

impl MediaError {
    /// Returns true if the failure is a permission denial, which the UI
    /// renders with an actionable message rather than a generic one.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied)
    }
}

//! Live viewer presence tracking.

use std::collections::HashSet;

use tracing::debug;

/// Tracks which remote participants are currently in the channel.
///
/// The count is derived from a set keyed by remote uid, so a duplicate
/// join notification does not double-count and a leave for an unknown
/// uid is a no-op; the count can never go negative.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    present: HashSet<u32>,
}

impl PresenceTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a remote-participant-joined notification.
    pub fn remote_joined(&mut self, uid: u32) -> u32 {
        if !self.present.insert(uid) {
            debug!(uid, "Duplicate join notification ignored");
        }
        self.count()
    }

    /// Apply a remote-participant-left notification.
    pub fn remote_left(&mut self, uid: u32) -> u32 {
        if !self.present.remove(&uid) {
            debug!(uid, "Leave notification for unknown participant ignored");
        }
        self.count()
    }

    /// Current viewer count.
    pub fn count(&self) -> u32 {
        self.present.len() as u32
    }

    /// Forget all participants; called when leaving the live phase.
    pub fn reset(&mut self) {
        self.present.clear();
    }
}

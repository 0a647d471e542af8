//! The broadcast session aggregate.

use chrono::Utc;

use stagecast_channel::Credential;
use stagecast_types::{ErrorRecord, SessionErrorKind, SessionPhase, SessionSnapshot};

use crate::presence::PresenceTracker;

/// State of one broadcast attempt, exclusively owned by the session
/// controller for its lifetime.
pub struct BroadcastSession {
    channel_id: String,
    phase: SessionPhase,

    /// Fresh random uid per join attempt, never reused across retries.
    pub participant_uid: Option<u32>,

    /// Single-use credential, present only between authorization and
    /// leaving the live phase.
    pub credential: Option<Credential>,

    /// Epoch milliseconds at which the session entered Live.
    pub started_at_epoch_millis: Option<i64>,

    /// Last user-facing failure, replaced rather than queued.
    pub last_error: Option<ErrorRecord>,

    /// Remote participant presence.
    pub presence: PresenceTracker,
}

impl BroadcastSession {
    /// Create an idle session for a channel.
    pub fn new(channel_id: String) -> Self {
        Self {
            channel_id,
            phase: SessionPhase::Idle,
            participant_uid: None,
            credential: None,
            started_at_epoch_millis: None,
            last_error: None,
            presence: PresenceTracker::new(),
        }
    }

    /// Channel id, stable for the session's lifetime.
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Move to a new phase, returning the previous one.
    pub fn set_phase(&mut self, phase: SessionPhase) -> SessionPhase {
        std::mem::replace(&mut self.phase, phase)
    }

    /// Record a user-facing failure, replacing any previous one.
    pub fn record_error(&mut self, kind: SessionErrorKind, message: impl Into<String>) -> ErrorRecord {
        let record = ErrorRecord::new(kind, message);
        self.last_error = Some(record.clone());
        record
    }

    /// Mark the session live as of now.
    pub fn mark_live(&mut self) {
        self.started_at_epoch_millis = Some(Utc::now().timestamp_millis());
        self.last_error = None;
    }

    /// Clear per-attempt state after leaving Live or after a failed
    /// join attempt. Viewer count resets to zero.
    pub fn clear_attempt(&mut self) {
        self.credential = None;
        self.participant_uid = None;
        self.started_at_epoch_millis = None;
        self.presence.reset();
    }

    /// Observable snapshot of the current state.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            channel_id: self.channel_id.clone(),
            phase: self.phase,
            participant_uid: self.participant_uid,
            viewer_count: self.presence.count(),
            started_at_epoch_millis: self.started_at_epoch_millis,
            last_error: self.last_error.clone(),
        }
    }
}

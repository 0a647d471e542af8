//! Time gate for going live.

use chrono::{DateTime, Duration, Utc};

/// Outcome of a gate evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Going live is permitted.
    Open,

    /// The gate has not opened yet.
    Closed {
        /// Whole minutes remaining until the gate opens.
        wait_minutes: u64,

        /// Remaining seconds after the whole minutes.
        wait_seconds: u64,
    },
}

/// Evaluate the gate at `now`: going live is permitted at or after
/// `event_start − early_entry_seconds`.
///
/// Evaluated at the moment go-live is requested, never cached; a denial
/// carries the exact remaining wait and the broadcaster must re-invoke
/// go-live.
pub fn evaluate_gate(
    event_start: DateTime<Utc>,
    early_entry_seconds: u64,
    now: DateTime<Utc>,
) -> GateDecision {
    let opens_at = event_start - Duration::seconds(early_entry_seconds as i64);

    if now >= opens_at {
        return GateDecision::Open;
    }

    // Round up so a denial never reports a zero wait.
    let remaining_millis = (opens_at - now).num_milliseconds().max(0) as u64;
    let remaining_seconds = remaining_millis.div_ceil(1_000);

    GateDecision::Closed {
        wait_minutes: remaining_seconds / 60,
        wait_seconds: remaining_seconds % 60,
    }
}

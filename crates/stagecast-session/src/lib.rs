//! Live broadcast session controller.
//!
//! This crate coordinates device acquisition, channel authorization and
//! join, track publication, presence, and teardown for one broadcast
//! session. The [`SessionController`] owns the session aggregate and is
//! driven by commands from the embedding UI; it emits observable
//! [`SessionEvent`](stagecast_types::SessionEvent)s back.

mod controller;
mod gate;
mod presence;
mod session;
mod status;

pub use controller::SessionController;
pub use gate::{evaluate_gate, GateDecision};
pub use presence::PresenceTracker;
pub use session::BroadcastSession;
pub use status::{HttpStatusSink, StatusSink, StatusSinkError, StreamStatus};

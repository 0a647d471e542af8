//! Typed messages and shared state for the stagecast broadcast stack.
//!
//! This crate defines the session phase machine, the command/event
//! vocabulary exchanged between an embedding UI and the session
//! controller, and the configuration object the controller is created
//! with.

mod commands;
mod events;
mod phase;
mod types;

pub use commands::SessionCommand;
pub use events::SessionEvent;
pub use phase::{EndReason, SessionPhase};
pub use types::{
    BroadcastConfig, DeviceDescriptor, DeviceKind, DeviceSelection, ErrorRecord, SessionErrorKind,
    SessionSnapshot, VideoConstraints,
};

use tokio::sync::mpsc::{channel, Receiver, Sender};

/// Channel capacity for commands (UI → controller).
pub const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Channel capacity for events (controller → UI).
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Creates a bounded command channel.
pub fn command_channel() -> (Sender<SessionCommand>, Receiver<SessionCommand>) {
    channel(COMMAND_CHANNEL_CAPACITY)
}

/// Creates a bounded event channel.
pub fn event_channel() -> (Sender<SessionEvent>, Receiver<SessionEvent>) {
    channel(EVENT_CHANNEL_CAPACITY)
}

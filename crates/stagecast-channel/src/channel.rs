//! Media channel seam and its event stream.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{channel, Receiver, Sender};

use stagecast_media::TrackPair;

use crate::connection::ConnectionState;
use crate::token::Credential;
use crate::ChannelResult;

/// Channel event stream capacity.
pub const CHANNEL_EVENT_CAPACITY: usize = 256;

/// Creates the bounded event stream a channel implementation pushes
/// presence and connection transitions into.
pub fn channel_events() -> (Sender<ChannelEvent>, Receiver<ChannelEvent>) {
    channel(CHANNEL_EVENT_CAPACITY)
}

/// Notifications pushed by the channel client, applied in receipt order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChannelEvent {
    /// A remote participant joined the channel.
    RemoteJoined { uid: u32 },

    /// A remote participant left the channel.
    RemoteLeft { uid: u32 },

    /// Transport connection state changed.
    Connection(ConnectionState),
}

/// A logical real-time media room, joined by exactly one local publisher.
///
/// One client exists per session controller; it is never shared across
/// concurrent sessions in the same page. Implementations surface remote
/// presence and connection transitions through the stream created by
/// [`channel_events`].
#[async_trait]
pub trait MediaChannel: Send + Sync {
    /// Join the channel as the given participant using a credential.
    ///
    /// Callers guarantee the credential is unexpired; a fresh one is
    /// requested per join attempt, never cached across attempts.
    async fn join(&self, channel_id: &str, credential: &Credential, uid: u32)
        -> ChannelResult<()>;

    /// Publish the local tracks. Only called after a successful join.
    async fn publish(&self, tracks: TrackPair) -> ChannelResult<()>;

    /// Stop publishing local tracks. Idempotent.
    async fn unpublish(&self) -> ChannelResult<()>;

    /// Leave the channel. Idempotent; must not fail if already left.
    async fn leave(&self) -> ChannelResult<()>;

    /// Current transport connection state.
    fn connection_state(&self) -> ConnectionState;
}

//! Real-time media channel abstraction and channel-access credentials.
//!
//! The session controller drives a [`MediaChannel`] implementation to
//! join a channel, publish local tracks, and leave; the channel pushes
//! presence and connection transitions back through a [`ChannelEvent`]
//! stream. Credentials come from an external token issuer behind the
//! [`CredentialIssuer`] seam.

mod channel;
mod connection;
mod error;
mod token;

pub use channel::{channel_events, ChannelEvent, MediaChannel, CHANNEL_EVENT_CAPACITY};
pub use connection::ConnectionState;
pub use error::ChannelError;
pub use token::{Credential, CredentialIssuer, HttpCredentialIssuer, Role};

/// Result type for channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

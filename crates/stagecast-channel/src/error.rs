//! Error types for the channel module.

use thiserror::Error;

/// Errors that can occur during channel operations.
#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    /// Credential request failed at the transport level.
    #[error("Credential request failed: {0}")]
    CredentialRequestFailed(String),

    /// The token issuer rejected the request.
    #[error("Credential denied: {0}")]
    CredentialDenied(String),

    /// The credential expired before it could be used.
    #[error("Credential expired")]
    CredentialExpired,

    /// Channel join failed.
    #[error("Channel join failed: {0}")]
    JoinFailed(String),

    /// Publishing local tracks failed.
    #[error("Publish failed: {0}")]
    PublishFailed(String),

    /// Operation requires a joined channel.
    #[error("Not connected")]
    NotConnected,

    /// Join attempted while already connected.
    #[error("Already connected")]
    AlreadyConnected,

    /// Endpoint URL is not valid.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

//! Channel-access credentials and the token issuer client.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use crate::{ChannelError, ChannelResult};

/// Role a participant joins a channel with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Publishes local tracks into the channel.
    Publisher,

    /// Receives remote tracks only.
    Subscriber,
}

impl Role {
    /// Wire name used by the token issuer.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Publisher => "publisher",
            Self::Subscriber => "subscriber",
        }
    }
}

/// A time-limited, server-issued channel authorization. Single-use per
/// join attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// Signed token presented on join.
    pub token: String,

    /// Expiry, ground truth from the issuer (the requested ttl may have
    /// been clamped server-side).
    pub expires_at_epoch_seconds: i64,
}

impl Credential {
    /// Returns true once the credential must no longer be presented to
    /// a join operation.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.expires_at_epoch_seconds
    }
}

/// External token issuer seam.
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    /// Request a signed credential for joining `channel_id` as `uid`
    /// in the given role.
    async fn request_credential(
        &self,
        channel_id: &str,
        uid: u32,
        role: Role,
        ttl_seconds: u64,
    ) -> ChannelResult<Credential>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenRequest<'a> {
    channel_name: &'a str,
    role: &'a str,
    uid: u32,
    ttl_seconds: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    token: String,
    #[allow(dead_code)]
    app_id: String,
    ttl: u64,
}

/// Token issuer client speaking the JSON contract of the issuing
/// service: POST `{ channelName, role, uid, ttlSeconds }`, response
/// `{ token, appId, ttl }`.
pub struct HttpCredentialIssuer {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpCredentialIssuer {
    /// Build a client for the given issuer endpoint.
    pub fn new(endpoint: &str) -> ChannelResult<Self> {
        let endpoint =
            Url::parse(endpoint).map_err(|e| ChannelError::InvalidEndpoint(e.to_string()))?;
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
        })
    }
}

#[async_trait]
impl CredentialIssuer for HttpCredentialIssuer {
    #[instrument(name = "request_credential", skip(self))]
    async fn request_credential(
        &self,
        channel_id: &str,
        uid: u32,
        role: Role,
        ttl_seconds: u64,
    ) -> ChannelResult<Credential> {
        let request = TokenRequest {
            channel_name: channel_id,
            role: role.as_str(),
            uid,
            ttl_seconds,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| ChannelError::CredentialRequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChannelError::CredentialDenied(format!(
                "issuer returned {status}: {body}"
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| ChannelError::CredentialRequestFailed(e.to_string()))?;

        // The issuer clamps the ttl; its returned value is ground truth.
        let expires_at = Utc::now().timestamp() + body.ttl as i64;

        debug!(ttl = body.ttl, "Credential issued");
        Ok(Credential {
            token: body.token,
            expires_at_epoch_seconds: expires_at,
        })
    }
}
